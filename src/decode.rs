//! Schema node → descriptor.
//!
//! The reverse of [`crate::encode`]. Rules are tried in a fixed order so the
//! `is_file_data` and `is_path` markers win over the generic record and
//! string forms they are shaped like.
use serde_json::{Map, Value};

use crate::error::{json_kind, Result, SchemaError};
use crate::ir::{FieldDefault, FieldDescriptor, Primitive, TypeDescriptor};

/// Name given to the root record when the caller has none.
pub const DEFAULT_MODEL_NAME: &str = "reconstructed_model";

/// Rebuild a descriptor from a schema document. A `{"type":"null"}` root
/// decodes to a record with no fields, so a function taking no parameters
/// still has a request model.
pub fn decode(schema: &Value, name: &str) -> Result<TypeDescriptor> {
    let is_null_root = schema
        .as_object()
        .is_some_and(|o| !o.contains_key("anyOf") && o.get("type") == Some(&Value::from("null")));
    let t = if is_null_root {
        TypeDescriptor::record(name, [])
    } else {
        decode_node(schema, name, "")?
    };
    tracing::debug!(%name, decoded = %t, "decoded schema");
    Ok(t)
}

fn decode_node(node: &Value, name: &str, path: &str) -> Result<TypeDescriptor> {
    let obj = node
        .as_object()
        .ok_or_else(|| SchemaError::malformed(path, format!("expected a schema node, found {}", json_kind(node))))?;
    if let Some(arms) = obj.get("anyOf") {
        return decode_any_of(arms, name, path);
    }
    if obj.keys().all(|k| k == "default") {
        return Ok(TypeDescriptor::Any);
    }
    let ty = match obj.get("type") {
        Some(Value::String(ty)) => ty.as_str(),
        Some(other) => return Err(SchemaError::malformed(path, format!("`type` must be a string, found {other}"))),
        None => return Err(SchemaError::malformed(path, "node has neither `type` nor `anyOf`")),
    };
    if let Some(values) = obj.get("enum") {
        return decode_enum(ty, values, name, path);
    }
    match ty {
        "null" => Ok(TypeDescriptor::None),
        "object" if flag(obj, "is_file_data") => Ok(TypeDescriptor::FileData),
        "string" if flag(obj, "is_path") => Ok(TypeDescriptor::Path),
        "object" if obj.contains_key("properties") => decode_record(obj, name, path),
        "object" if obj.contains_key("items") => decode_mapping(&obj["items"], name, path),
        "object" => Err(SchemaError::malformed(path, "object node has neither `properties` nor key/value `items`")),
        "array" => match obj.get("items") {
            Some(items) => Ok(TypeDescriptor::list(decode_node(
                items,
                &format!("{name}_type"),
                &pointer(path, "items"),
            )?)),
            None => Ok(TypeDescriptor::list(TypeDescriptor::Any)),
        },
        other => Primitive::from_schema_name(other)
            .map(|primitive| TypeDescriptor::Primitive { primitive })
            .ok_or_else(|| SchemaError::malformed(&pointer(path, "type"), format!("unknown type `{other}`"))),
    }
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

// ---- Composite nodes ---- //

// Null alternatives become optionality; one remaining alternative keeps the
// field's own name, several get indexed names.
fn decode_any_of(arms: &Value, name: &str, path: &str) -> Result<TypeDescriptor> {
    let arms_path = pointer(path, "anyOf");
    let arms = match arms.as_array() {
        Some(arms) if !arms.is_empty() => arms,
        _ => return Err(SchemaError::malformed(&arms_path, "`anyOf` must be a non-empty array")),
    };
    let is_null = |arm: &Value| arm.get("type") == Some(&Value::from("null")) && arm.get("anyOf").is_none();
    let had_null = arms.iter().any(is_null);
    let rest: Vec<(usize, &Value)> = arms.iter().enumerate().filter(|(_, arm)| !is_null(*arm)).collect();

    match rest.as_slice() {
        [] => Ok(TypeDescriptor::None),
        [(i, only)] => {
            let t = decode_node(only, name, &pointer(&arms_path, &i.to_string()))?;
            Ok(if had_null { TypeDescriptor::optional(t) } else { t })
        }
        many => {
            let mut members = many
                .iter()
                .enumerate()
                .map(|(index, (i, arm))| {
                    decode_node(arm, &format!("{name}_{index}"), &pointer(&arms_path, &i.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            if had_null {
                members.push(TypeDescriptor::None);
            }
            Ok(TypeDescriptor::union(members))
        }
    }
}

fn decode_enum(ty: &str, values: &Value, name: &str, path: &str) -> Result<TypeDescriptor> {
    let enum_path = pointer(path, "enum");
    let kind = Primitive::from_schema_name(ty)
        .ok_or_else(|| SchemaError::malformed(path, format!("enum node has non-primitive type `{ty}`")))?;
    let values = match values.as_array() {
        Some(values) if !values.is_empty() => values,
        _ => return Err(SchemaError::malformed(&enum_path, "`enum` must be a non-empty array")),
    };
    if let Some((i, bad)) = values.iter().enumerate().find(|(_, v)| !kind.admits(v)) {
        return Err(SchemaError::malformed(
            &pointer(&enum_path, &i.to_string()),
            format!("{bad} is not a valid {ty}"),
        ));
    }
    Ok(TypeDescriptor::literal(format!("{name}_enum"), values.iter().cloned()))
}

fn decode_mapping(items: &Value, name: &str, path: &str) -> Result<TypeDescriptor> {
    let items_path = pointer(path, "items");
    let (Some(key), Some(value)) = (items.get("key"), items.get("value")) else {
        return Err(SchemaError::malformed(&items_path, "mapping items need both `key` and `value`"));
    };
    let key = decode_node(key, &format!("{name}_key"), &pointer(&items_path, "key"))?;
    let value = decode_node(value, &format!("{name}_value"), &pointer(&items_path, "value"))?;
    Ok(TypeDescriptor::mapping(key, value))
}

fn decode_record(obj: &Map<String, Value>, name: &str, path: &str) -> Result<TypeDescriptor> {
    let props_path = pointer(path, "properties");
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::malformed(&props_path, "`properties` must be an object"))?;
    let required = match obj.get("required") {
        None => None,
        Some(Value::Array(names)) => Some(
            names
                .iter()
                .map(|n| n.as_str().ok_or_else(|| SchemaError::malformed(&pointer(path, "required"), "names must be strings")))
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(_) => return Err(SchemaError::malformed(&pointer(path, "required"), "`required` must be an array")),
    };
    if let Some(missing) = required.iter().flatten().find(|n| !properties.contains_key(**n)) {
        return Err(SchemaError::malformed(
            &pointer(path, "required"),
            format!("`{missing}` is required but not a property"),
        ));
    }

    let mut fields = Vec::with_capacity(properties.len());
    for (key, node) in properties {
        let ty = decode_node(node, &format!("{name}_{key}"), &pointer(&props_path, key))?;
        let is_required = required.as_ref().is_none_or(|names| names.contains(&key.as_str()));
        let field = match node.get("default") {
            // a null default is the folded form of Optional[X] = None
            Some(Value::Null) => FieldDescriptor::new(key.clone(), widen_optional(ty)).with_default(Value::Null),
            Some(default) => FieldDescriptor::new(key.clone(), ty).with_default(default.clone()),
            None if is_required => FieldDescriptor::new(key.clone(), ty),
            None => FieldDescriptor {
                name: key.clone(),
                ty: widen_optional(ty),
                default: FieldDefault::Value(Value::Null),
            },
        };
        fields.push(field);
    }
    Ok(TypeDescriptor::record(name, fields))
}

fn widen_optional(t: TypeDescriptor) -> TypeDescriptor {
    if t.is_optional() { t } else { TypeDescriptor::optional(t) }
}

/// Append one escaped JSON-pointer segment.
fn pointer(base: &str, segment: &str) -> String {
    format!("{base}/{}", segment.replace('~', "~0").replace('/', "~1"))
}
