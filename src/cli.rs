//! Minimal CLI: manifest → schema, schema → (check | decode), request → coerce
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::{Map, Value};

use plugin_schema::builder::{filedata_meta_schema, schema_dict, SchemaOptions};
use plugin_schema::coerce::coerce;
use plugin_schema::decode::{decode, DEFAULT_MODEL_NAME};
use plugin_schema::grammar::{is_valid_input_schema, is_valid_response_schema};
use plugin_schema::manifest::Manifest;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// derive request/response schemas for plugin functions, validate them, and play them back
#[derive(Parser, Debug)]
#[command(name = "plugin-schema", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve a manifest and print its `{"inputs", "outputs"}` schema
    Schema(SchemaOut),
    /// check schema documents against the closed node grammar
    Check(CheckOut),
    /// rebuild a descriptor tree from a schema document
    Decode(DecodeOut),
    /// coerce a raw request body against a manifest's function signature
    Coerce(CoerceOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select a subnode in each document (e.g. /inputs)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    /// plugin manifest (.json)
    #[arg(long, short)]
    manifest: PathBuf,

    /// parameter names hidden from the input schema
    /// (default: usage, filedata_meta, message_channels)
    #[arg(long, num_args = 1..)]
    omit: Option<Vec<String>>,

    /// also emit the `filedata_meta` side-channel schema
    #[arg(long)]
    filedata_meta: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// check documents as response schemas instead of request schemas
    #[arg(long, default_value_t = false)]
    response: bool,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// name of the root model
    #[arg(long, default_value = DEFAULT_MODEL_NAME)]
    name: String,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CoerceOut {
    /// plugin manifest (.json)
    #[arg(long, short)]
    manifest: PathBuf,

    /// raw request body (.json object)
    #[arg(long, short)]
    request: PathBuf,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn source_paths(&self) -> anyhow::Result<Vec<PathBuf>> {
        resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")
    }

    fn load(&self, source_path: &Path) -> anyhow::Result<Value> {
        let json_value = read_json(source_path)?;
        match self.json_pointer.as_deref() {
            None => Ok(json_value),
            Some(pointer) => json_value.pointer(pointer).cloned().ok_or_else(|| {
                anyhow!("JSON pointer {pointer} selects nothing in {}", source_path.display())
            }),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cmd {
            Command::Schema(target) => {
                let manifest = load_manifest(&target.manifest)?;
                let signature = manifest.signature()?;
                let options = match &target.omit {
                    Some(names) => SchemaOptions::omitting(names),
                    None => SchemaOptions::default(),
                };
                let mut schema = schema_dict(&signature, &options)?;
                if target.filedata_meta {
                    schema["filedata_meta"] = filedata_meta_schema(&signature)?;
                }
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&schema)?)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Check(target) => {
                let source_paths = target.input_settings.source_paths()?;
                let results: Vec<(PathBuf, anyhow::Result<bool>)> = source_paths
                    .into_par_iter()
                    .map(|path| {
                        let verdict = target.input_settings.load(&path).map(|doc| {
                            if target.response {
                                is_valid_response_schema(&doc)
                            } else {
                                is_valid_input_schema(&doc)
                            }
                        });
                        (path, verdict)
                    })
                    .collect();
                let mut failures = 0usize;
                for (path, verdict) in &results {
                    match verdict {
                        Ok(true) => println!("{} {}", "✅".green(), path.display()),
                        Ok(false) => {
                            failures += 1;
                            println!("{} {}: {}", "❌".red(), path.display(), "not a valid schema".red());
                        }
                        Err(error) => {
                            failures += 1;
                            println!("{} {}: {}", "❌".red(), path.display(), format!("{error:#}").red());
                        }
                    }
                }
                tracing::debug!(checked = results.len(), failures, "check finished");
                if failures == 0 {
                    Ok(ExitCode::SUCCESS)
                } else {
                    eprintln!("{}", format!("{failures} of {} document(s) failed", results.len()).red().bold());
                    Ok(ExitCode::FAILURE)
                }
            }
            Command::Decode(target) => {
                let mut decoded = Vec::new();
                for source_path in target.input_settings.source_paths()? {
                    let schema = target.input_settings.load(&source_path)?;
                    let descriptor = decode(&schema, &target.name)
                        .with_context(|| format!("failed to decode {}", source_path.display()))?;
                    decoded.push(serde_json::to_value(&descriptor)?);
                }
                let output = match decoded.len() {
                    1 => decoded.remove(0),
                    _ => Value::Array(decoded),
                };
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&output)?)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Coerce(target) => {
                let signature = load_manifest(&target.manifest)?.signature()?;
                let raw: Map<String, Value> = match read_json(&target.request)? {
                    Value::Object(map) => map,
                    other => bail!("request body must be a JSON object, found {other}"),
                };
                let coerced = coerce(&signature, &raw)?;
                println!("{}", serde_json::to_string_pretty(&coerced)?);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest file {}", path.display()))?;
    Manifest::from_json_str(&source).with_context(|| format!("failed to load manifest {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file {}", path.display()))?;
    serde_json::from_str::<Value>(&source)
        .with_context(|| format!("failed to parse JSON source file ({})", path.display()))
}

fn write_output(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
