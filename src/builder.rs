//! Request/response schemas for a whole function signature.
use serde_json::{json, Map, Value};

use crate::encode::{encode, encode_field};
use crate::error::{Result, SchemaError};
use crate::filedata::filedata_meta_descriptor;
use crate::ir::{FunctionSignature, ParamKind, Parameter, TypeDescriptor};

/// Which parameters are hidden from the request contract. They are still
/// part of the signature and get injected by the serving layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaOptions {
    pub omit: Vec<String>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        SchemaOptions::omitting(["usage", "filedata_meta", "message_channels"])
    }
}

impl SchemaOptions {
    pub fn omitting(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        SchemaOptions { omit: names.into_iter().map(Into::into).collect() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INPUTS
// ————————————————————————————————————————————————————————————————————————————

/// Variadic parameters have no fixed name to put in a request body.
pub fn run_input_checks(params: &[Parameter]) -> Result<()> {
    let variadic: Vec<String> = params
        .iter()
        .filter(|p| matches!(p.kind, ParamKind::VarPositional | ParamKind::VarKeyword))
        .map(Parameter::display_name)
        .collect();
    if variadic.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::VariadicNotSupported { params: variadic })
    }
}

pub fn parameters_to_json_schema(params: &[Parameter]) -> Result<Value> {
    run_input_checks(params)?;
    if params.is_empty() {
        return Ok(json!({ "type": "null" }));
    }
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in params {
        properties.insert(p.name.clone(), encode_field(&p.ty, &p.default)?);
        if p.default.is_missing() {
            required.push(Value::String(p.name.clone()));
        }
    }
    let mut out = Map::new();
    out.insert("type".into(), Value::from("object"));
    if !properties.is_empty() {
        out.insert("properties".into(), Value::Object(properties));
    }
    if !required.is_empty() {
        out.insert("required".into(), Value::Array(required));
    }
    Ok(Value::Object(out))
}

// ————————————————————————————————————————————————————————————————————————————
// OUTPUTS
// ————————————————————————————————————————————————————————————————————————————

/// Responses must be self-describing: records, enumerations, file data, or
/// nothing, possibly inside unions and lists. A bare scalar or mapping at the
/// root carries no field-level schema.
pub fn run_output_checks(t: &TypeDescriptor) -> Result<()> {
    check_output(t).map_err(|offender| {
        if offender == t.to_string() {
            SchemaError::UnsupportedResponseType(offender)
        } else {
            SchemaError::UnsupportedResponseType(format!("{offender} in {t}"))
        }
    })
}

fn check_output(t: &TypeDescriptor) -> std::result::Result<(), String> {
    match t {
        TypeDescriptor::Optional { inner } => check_output(inner),
        TypeDescriptor::Union { members } => members.iter().try_for_each(check_output),
        TypeDescriptor::List { element } => check_output(element),
        TypeDescriptor::Record(_)
        | TypeDescriptor::Enumeration(_)
        | TypeDescriptor::FileData
        | TypeDescriptor::None => Ok(()),
        TypeDescriptor::Primitive { .. }
        | TypeDescriptor::Mapping { .. }
        | TypeDescriptor::Any
        | TypeDescriptor::Path => Err(t.to_string()),
    }
}

pub fn response_to_json_schema(t: &TypeDescriptor) -> Result<Value> {
    run_output_checks(t)?;
    encode(t)
}

// ————————————————————————————————————————————————————————————————————————————
// SIGNATURES
// ————————————————————————————————————————————————————————————————————————————

pub fn input_schema(sig: &FunctionSignature, options: &SchemaOptions) -> Result<Value> {
    let params: Vec<Parameter> = sig
        .params
        .iter()
        .filter(|p| !options.omit.iter().any(|o| o == &p.name))
        .cloned()
        .collect();
    let schema = parameters_to_json_schema(&params)?;
    tracing::debug!(function = %sig.name, params = params.len(), "built input schema");
    Ok(schema)
}

pub fn output_schema(sig: &FunctionSignature) -> Result<Value> {
    let schema = response_to_json_schema(&sig.returns)?;
    tracing::debug!(function = %sig.name, returns = %sig.returns, "built output schema");
    Ok(schema)
}

/// `{"inputs": .., "outputs": ..}` as served on a plugin's schema endpoint.
pub fn schema_dict(sig: &FunctionSignature, options: &SchemaOptions) -> Result<Value> {
    Ok(json!({
        "inputs": input_schema(sig, options)?,
        "outputs": output_schema(sig)?,
    }))
}

/// Schema of the `filedata_meta` object a plugin fills to fan its input out
/// into new records, with contents typed as the plugin's response.
pub fn filedata_meta_schema(sig: &FunctionSignature) -> Result<Value> {
    run_output_checks(&sig.returns)?;
    encode(&filedata_meta_descriptor(&sig.returns))
}
