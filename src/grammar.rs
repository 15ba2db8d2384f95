//! Structural validation of schema documents.
//!
//! Works on raw JSON without the descriptors that produced it, so a schema
//! fetched from another process can be sanity-checked. Never fails: a
//! document that matches no node form is simply invalid.
use serde_json::{Map, Value};

use crate::ir::Primitive;

/// Request schemas are either `{"type":"null"}` or a record-form object.
pub fn is_valid_input_schema(doc: &Value) -> bool {
    let Some(node) = doc.as_object() else { return false };
    match node.get("type").and_then(Value::as_str) {
        Some("null") => is_null_node(node),
        Some("object") => !node.contains_key("items") && is_record_node(node),
        _ => false,
    }
}

/// Response schemas: null, a record, a union, a list, or an enumeration.
/// Bare scalars, mappings and the any-node are not self-describing.
pub fn is_valid_response_schema(doc: &Value) -> bool {
    let Some(node) = doc.as_object() else { return false };
    if node.contains_key("anyOf") {
        return is_any_of_node(node);
    }
    match node.get("type").and_then(Value::as_str) {
        Some("null") => is_null_node(node),
        Some("object") => !node.contains_key("items") && is_record_node(node),
        Some("array") => is_array_node(node),
        Some(t) if Primitive::from_schema_name(t).is_some() => {
            node.contains_key("enum") && is_primitive_node(node)
        }
        _ => false,
    }
}

/// Any member of the closed node grammar, at any depth.
pub fn is_valid_node(doc: &Value) -> bool {
    let Some(node) = doc.as_object() else { return false };
    if node.keys().all(|k| k == "default") {
        return true;
    }
    if node.contains_key("anyOf") {
        return is_any_of_node(node);
    }
    match node.get("type").and_then(Value::as_str) {
        Some("null") => is_null_node(node),
        Some("array") => is_array_node(node),
        Some("object") if node.contains_key("items") => is_mapping_node(node),
        Some("object") => is_record_node(node),
        Some(t) if Primitive::from_schema_name(t).is_some() => is_primitive_node(node),
        _ => false,
    }
}

// ------------------------------ Node forms -------------------------------- //

fn only_keys(node: &Map<String, Value>, allowed: &[&str]) -> bool {
    node.keys().all(|k| allowed.contains(&k.as_str()))
}

fn is_null_node(node: &Map<String, Value>) -> bool {
    only_keys(node, &["type", "default"]) && node.get("default").is_none_or(Value::is_null)
}

fn is_primitive_node(node: &Map<String, Value>) -> bool {
    let Some(kind) = node.get("type").and_then(Value::as_str).and_then(Primitive::from_schema_name) else {
        return false;
    };
    if !only_keys(node, &["type", "default", "is_path", "enum"]) {
        return false;
    }
    if let Some(flag) = node.get("is_path") {
        if kind != Primitive::String || flag != &Value::Bool(true) {
            return false;
        }
    }
    if let Some(values) = node.get("enum") {
        let Some(values) = values.as_array() else { return false };
        if values.is_empty() || !values.iter().all(|v| kind.admits(v)) {
            return false;
        }
    }
    node.get("default").is_none_or(|d| d.is_null() || kind.admits(d))
}

fn is_array_node(node: &Map<String, Value>) -> bool {
    only_keys(node, &["type", "items", "default"]) && node.get("items").is_none_or(is_valid_node)
}

fn is_mapping_node(node: &Map<String, Value>) -> bool {
    if !only_keys(node, &["type", "items", "default"]) {
        return false;
    }
    let Some(items) = node.get("items").and_then(Value::as_object) else { return false };
    items.len() == 2
        && items.get("key").is_some_and(is_valid_node)
        && items.get("value").is_some_and(is_valid_node)
}

fn is_record_node(node: &Map<String, Value>) -> bool {
    if !only_keys(node, &["type", "properties", "required", "is_file_data", "default"]) {
        return false;
    }
    if let Some(flag) = node.get("is_file_data") {
        if flag != &Value::Bool(true) {
            return false;
        }
    }
    let properties = match node.get("properties") {
        None => None,
        Some(Value::Object(props)) => {
            if !props.values().all(is_valid_node) {
                return false;
            }
            Some(props)
        }
        Some(_) => return false,
    };
    match node.get("required") {
        None => true,
        Some(Value::Array(names)) => names.iter().all(|n| match (n.as_str(), properties) {
            (Some(name), Some(props)) => props.contains_key(name),
            (Some(_), None) => false,
            (None, _) => false,
        }),
        Some(_) => false,
    }
}

fn is_any_of_node(node: &Map<String, Value>) -> bool {
    if !only_keys(node, &["anyOf", "default"]) {
        return false;
    }
    match node.get("anyOf") {
        Some(Value::Array(arms)) => !arms.is_empty() && arms.iter().all(is_valid_node),
        _ => false,
    }
}
