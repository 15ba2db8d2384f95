//! Descriptor → schema node.
//!
//! Every node produced here is a member of the closed grammar checked by
//! [`crate::grammar`]:
//!
//! - `{"type":"null"}`
//! - `{"type":<primitive>}` with optional `default`, `is_path`
//! - `{"type":"array","items":<node>}`
//! - `{"type":"object","properties":{..},"required":[..]}` with optional `is_file_data`
//! - `{"type":"object","items":{"key":<node>,"value":<node>}}`
//! - `{"type":<primitive>,"enum":[..]}`
//! - `{"anyOf":[<node>,..]}`
//! - `{}` (anything)
use serde_json::{json, Map, Value};

use crate::error::{Result, SchemaError};
use crate::filedata::FileData;
use crate::ir::{EnumType, FieldDefault, FieldDescriptor, Primitive, TypeDescriptor};

pub fn encode(t: &TypeDescriptor) -> Result<Value> {
    match t {
        TypeDescriptor::None => Ok(json!({ "type": "null" })),
        TypeDescriptor::Any => Ok(json!({})),
        TypeDescriptor::Optional { .. } | TypeDescriptor::Union { .. } => encode_union(t),
        TypeDescriptor::List { element } => Ok(json!({
            "type": "array",
            "items": encode(element)?,
        })),
        TypeDescriptor::Mapping { key, value } => {
            check_mapping_key(key)?;
            Ok(json!({
                "type": "object",
                "items": { "key": encode(key)?, "value": encode(value)? },
            }))
        }
        TypeDescriptor::Enumeration(e) => encode_enum(e),
        TypeDescriptor::Record(r) => encode_record(&r.fields, false),
        TypeDescriptor::Path => Ok(json!({ "type": "string", "is_path": true })),
        TypeDescriptor::FileData => encode_record(&FileData::fields(), true),
        TypeDescriptor::Primitive { primitive } => Ok(json!({ "type": primitive.schema_name() })),
    }
}

/// Encode a field or parameter type and attach its default, if any.
pub fn encode_field(t: &TypeDescriptor, default: &FieldDefault) -> Result<Value> {
    let mut node = encode(t)?;
    if let (FieldDefault::Value(v), Value::Object(map)) = (default, &mut node) {
        map.insert("default".into(), v.clone());
    }
    Ok(node)
}

// Collapse common unions: X ∪ null → X; the optionality is carried by the
// field's default, not by the node.
fn encode_union(t: &TypeDescriptor) -> Result<Value> {
    let members = flatten_union(t);
    if members.is_empty() {
        return Err(SchemaError::UnsupportedType(format!("empty union: {t}")));
    }
    let non_null = members.iter().filter(|m| !m.is_none()).count();
    match non_null {
        0 => Ok(json!({ "type": "null" })),
        1 => members
            .into_iter()
            .find(|m| !m.is_none())
            .map(encode)
            .unwrap_or_else(|| Ok(json!({ "type": "null" }))),
        _ => {
            let arms = members.into_iter().map(encode).collect::<Result<Vec<_>>>()?;
            Ok(json!({ "anyOf": arms }))
        }
    }
}

/// Union members in declaration order, nested unions inlined, at most one
/// `None`.
fn flatten_union(t: &TypeDescriptor) -> Vec<&TypeDescriptor> {
    fn go<'a>(t: &'a TypeDescriptor, out: &mut Vec<&'a TypeDescriptor>) {
        match t {
            TypeDescriptor::Optional { inner } => {
                go(inner, out);
                push_null(out);
            }
            TypeDescriptor::Union { members } => members.iter().for_each(|m| go(m, out)),
            TypeDescriptor::None => push_null(out),
            other => out.push(other),
        }
    }
    static NULL: TypeDescriptor = TypeDescriptor::None;
    fn push_null(out: &mut Vec<&TypeDescriptor>) {
        if !out.iter().any(|m| m.is_none()) {
            out.push(&NULL);
        }
    }
    let mut out = Vec::new();
    go(t, &mut out);
    out
}

fn encode_enum(e: &EnumType) -> Result<Value> {
    if e.members.is_empty() {
        return Err(SchemaError::UnsupportedType(format!("enum {} has no members", e.name)));
    }
    let mut kinds: Vec<Primitive> = Vec::new();
    for m in &e.members {
        let kind = Primitive::of_value(&m.value).ok_or_else(|| {
            SchemaError::UnsupportedType(format!("enum {} member {} has non-scalar value {}", e.name, m.label, m.value))
        })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.len() > 1 {
        return Err(SchemaError::InconsistentEnumType {
            name: e.name.clone(),
            kinds: kinds.iter().map(|k| k.schema_name().to_string()).collect(),
        });
    }
    let values: Vec<Value> = e.members.iter().map(|m| m.value.clone()).collect();
    Ok(json!({ "type": kinds[0].schema_name(), "enum": values }))
}

fn encode_record(fields: &[FieldDescriptor], is_file_data: bool) -> Result<Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for f in fields {
        properties.insert(f.name.clone(), encode_field(&f.ty, &f.default)?);
        if f.default.is_missing() {
            required.push(Value::String(f.name.clone()));
        }
    }
    let mut node = Map::new();
    node.insert("type".into(), Value::from("object"));
    if is_file_data {
        node.insert("is_file_data".into(), Value::Bool(true));
    }
    node.insert("properties".into(), Value::Object(properties));
    node.insert("required".into(), Value::Array(required));
    Ok(Value::Object(node))
}

fn check_mapping_key(key: &TypeDescriptor) -> Result<()> {
    match key {
        TypeDescriptor::Primitive { .. }
        | TypeDescriptor::Enumeration(_)
        | TypeDescriptor::Path
        | TypeDescriptor::Any => Ok(()),
        other => Err(SchemaError::UnsupportedType(format!("mapping keys must be scalar, got {other}"))),
    }
}
