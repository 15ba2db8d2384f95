//! CLI integration tests for plugin-schema
//!
//! These tests drive the binary over files in a temporary directory.

use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn plugin_schema_cmd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("plugin-schema"))
}

const MANIFEST: &str = r#"{
    "types": [
        {"record": {"name": "Output", "fields": [{"name": "n", "annotation": "float"}]}},
        {"record": {"name": "A", "fields": [
            {"name": "b", "annotation": "int"},
            {"name": "c", "annotation": "float"}
        ]}}
    ],
    "function": {
        "name": "f",
        "params": [
            {"name": "usage", "annotation": "list[dict]", "default": []},
            {"name": "filedata_meta", "annotation": "Any", "default": null},
            {"name": "a", "annotation": "A"},
            {"name": "b", "annotation": "float", "default": 4}
        ],
        "returns": "Optional[Output]"
    }
}"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

// =============================================================================
// schema
// =============================================================================

#[test]
fn test_schema_prints_inputs_and_outputs() {
    let dir = TempDir::new().unwrap();
    let manifest = write(&dir, "manifest.json", MANIFEST);

    let output = plugin_schema_cmd().arg("schema").arg("--manifest").arg(&manifest).output().unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["inputs"]["required"], serde_json::json!(["a"]));
    assert!(schema["inputs"]["properties"].get("usage").is_none());
    assert!(schema["inputs"]["properties"].get("filedata_meta").is_none());
    assert_eq!(schema["outputs"]["properties"]["n"], serde_json::json!({"type": "number"}));
}

#[test]
fn test_schema_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let manifest = write(&dir, "manifest.json", MANIFEST);
    let out = dir.path().join("out/schema.json");

    plugin_schema_cmd()
        .arg("schema")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--omit")
        .arg("a")
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let schema: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(schema["inputs"]["properties"].get("usage").is_some());
    assert!(schema["inputs"]["properties"].get("a").is_none());
}

#[test]
fn test_schema_filedata_meta_section() {
    let dir = TempDir::new().unwrap();
    let manifest = write(&dir, "manifest.json", MANIFEST);

    let output = plugin_schema_cmd().arg("schema").arg("-m").arg(&manifest).output().unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema.get("filedata_meta").is_none());

    let output = plugin_schema_cmd()
        .arg("schema")
        .arg("-m")
        .arg(&manifest)
        .arg("--filedata-meta")
        .output()
        .unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let contents = &schema["filedata_meta"]["properties"]["new_records"]["items"]["properties"]["contents"];
    assert_eq!(contents["properties"]["n"], serde_json::json!({"type": "number"}));
    assert_eq!(contents.get("default"), Some(&serde_json::Value::Null));
}

#[test]
fn test_schema_rejects_unstructured_response() {
    let dir = TempDir::new().unwrap();
    let manifest = write(
        &dir,
        "manifest.json",
        r#"{"function": {"name": "f", "params": [], "returns": "dict[str, Any]"}}"#,
    );

    plugin_schema_cmd()
        .arg("schema")
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported response type"));
}

// =============================================================================
// check
// =============================================================================

#[test]
fn test_check_accepts_valid_documents_by_glob() {
    let dir = TempDir::new().unwrap();
    write(&dir, "one.json", r#"{"type": "null"}"#);
    write(&dir, "two.json", r#"{"type": "object", "properties": {"x": {"type": "integer"}}, "required": ["x"]}"#);
    let pattern = dir.path().join("*.json");

    plugin_schema_cmd()
        .arg("check")
        .arg("--input")
        .arg(&pattern)
        .assert()
        .success()
        .stdout(predicate::str::contains("one.json"))
        .stdout(predicate::str::contains("two.json"));
}

#[test]
fn test_check_fails_on_invalid_document() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.json", r#"{"type": "null"}"#);
    let bad = write(&dir, "bad.json", r#"{"type": "banana"}"#);

    plugin_schema_cmd()
        .arg("check")
        .arg("--input")
        .arg(&good)
        .arg(&bad)
        .assert()
        .failure()
        .stdout(predicate::str::contains("not a valid schema"))
        .stderr(predicate::str::contains("1 of 2 document(s) failed"));
}

#[test]
fn test_check_response_with_json_pointer() {
    let dir = TempDir::new().unwrap();
    let doc = write(
        &dir,
        "schema.json",
        r#"{"inputs": {"type": "null"}, "outputs": {"type": "array", "items": {"type": "string", "enum": ["a"]}}}"#,
    );

    plugin_schema_cmd()
        .arg("check")
        .arg("--response")
        .arg("--json-pointer")
        .arg("/outputs")
        .arg("--input")
        .arg(&doc)
        .assert()
        .success();
}

// =============================================================================
// decode
// =============================================================================

#[test]
fn test_decode_prints_descriptor_tree() {
    let dir = TempDir::new().unwrap();
    let doc = write(&dir, "schema.json", r#"{"type": "object", "properties": {"p": {"type": "string", "is_path": true}}, "required": ["p"]}"#);

    let output = plugin_schema_cmd()
        .arg("decode")
        .arg("--input")
        .arg(&doc)
        .arg("--name")
        .arg("Request")
        .output()
        .unwrap();
    assert!(output.status.success());
    let tree: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tree["kind"], "record");
    assert_eq!(tree["name"], "Request");
    assert_eq!(tree["fields"][0]["type"], serde_json::json!({"kind": "path"}));
}

#[test]
fn test_decode_reports_malformed_path() {
    let dir = TempDir::new().unwrap();
    let doc = write(&dir, "schema.json", r#"{"type": "object", "properties": {"x": {"type": "banana"}}}"#);

    plugin_schema_cmd()
        .arg("decode")
        .arg("--input")
        .arg(&doc)
        .assert()
        .failure()
        .stderr(predicate::str::contains("/properties/x/type"));
}

// =============================================================================
// coerce
// =============================================================================

#[test]
fn test_coerce_constructs_records() {
    let dir = TempDir::new().unwrap();
    let manifest = write(&dir, "manifest.json", MANIFEST);
    let request = write(&dir, "request.json", r#"{"a": {"b": 4, "c": 5.6}, "b": 1}"#);

    let output = plugin_schema_cmd()
        .arg("coerce")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--request")
        .arg(&request)
        .output()
        .unwrap();
    assert!(output.status.success());
    let coerced: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(coerced, serde_json::json!({"a": {"b": 4, "c": 5.6}, "b": 1}));
}

#[test]
fn test_coerce_names_failing_field() {
    let dir = TempDir::new().unwrap();
    let manifest = write(&dir, "manifest.json", MANIFEST);
    let request = write(&dir, "request.json", r#"{"a": {"b": 4}}"#);

    plugin_schema_cmd()
        .arg("coerce")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--request")
        .arg(&request)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to map input for field a"))
        .stderr(predicate::str::contains("missing required field `c`"));
}
