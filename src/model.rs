//! Structural values validated against a descriptor tree.
//!
//! A decoded schema has no Rust type behind it, so "constructing an instance
//! of the reconstructed model" means checking a JSON value against the
//! descriptor tree and producing a [`StructuralValue`].
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ConstructionError;
use crate::filedata::FileData;
use crate::ir::{EnumType, Primitive, RecordType, TypeDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub enum StructuralValue {
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Number(f64),
    String(String),
    Path(PathBuf),
    List(Vec<StructuralValue>),
    Map(IndexMap<String, StructuralValue>),
    Record(RecordInstance),
    Enum(EnumValue),
    FileData(Box<FileData>),
    /// Unconstrained or passed-through JSON.
    Raw(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordInstance {
    pub type_name: String,
    pub fields: IndexMap<String, StructuralValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub type_name: String,
    pub label: String,
    pub value: Value,
}

impl RecordInstance {
    pub fn get(&self, field: &str) -> Option<&StructuralValue> {
        self.fields.get(field)
    }
}

impl StructuralValue {
    pub fn to_json(&self) -> Value {
        match self {
            StructuralValue::Null => Value::Null,
            StructuralValue::Bool(b) => Value::Bool(*b),
            StructuralValue::Integer(i) => Value::from(*i),
            StructuralValue::Unsigned(u) => Value::from(*u),
            StructuralValue::Number(n) => Value::from(*n),
            StructuralValue::String(s) => Value::String(s.clone()),
            StructuralValue::Path(p) => Value::String(p.to_string_lossy().into_owned()),
            StructuralValue::List(xs) => Value::Array(xs.iter().map(Self::to_json).collect()),
            StructuralValue::Map(m) => {
                Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<Map<_, _>>())
            }
            StructuralValue::Record(r) => {
                Value::Object(r.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect::<Map<_, _>>())
            }
            StructuralValue::Enum(e) => e.value.clone(),
            StructuralValue::FileData(fd) => fd.to_json(),
            StructuralValue::Raw(v) => v.clone(),
        }
    }
}

impl Serialize for StructuralValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION
// ————————————————————————————————————————————————————————————————————————————

/// Check `value` against `t`, filling record defaults.
pub fn validate_payload(t: &TypeDescriptor, value: &Value) -> Result<StructuralValue, ConstructionError> {
    build(t, value, "")
}

/// Build a record instance from a raw object.
pub fn construct_record(r: &RecordType, value: &Value) -> Result<RecordInstance, ConstructionError> {
    build_record(r, value, "")
}

/// Look up the member whose value is `value`.
pub fn construct_enum(e: &EnumType, value: &Value) -> Result<EnumValue, ConstructionError> {
    e.member(value)
        .map(|m| EnumValue { type_name: e.name.clone(), label: m.label.clone(), value: m.value.clone() })
        .ok_or_else(|| ConstructionError::InvalidEnumValue { name: e.name.clone(), value: value.clone() })
}

fn build(t: &TypeDescriptor, v: &Value, path: &str) -> Result<StructuralValue, ConstructionError> {
    match t {
        TypeDescriptor::Primitive { primitive } => build_primitive(*primitive, v, path),
        TypeDescriptor::None => match v {
            Value::Null => Ok(StructuralValue::Null),
            other => Err(ConstructionError::mismatch(path, "null", other)),
        },
        TypeDescriptor::Any => Ok(StructuralValue::Raw(v.clone())),
        TypeDescriptor::Optional { .. } | TypeDescriptor::Union { .. } => build_union(t, v, path),
        TypeDescriptor::List { element } => {
            let items = v.as_array().ok_or_else(|| ConstructionError::mismatch(path, "array", v))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| build(element, item, &format!("{path}/{i}")))
                .collect::<Result<Vec<_>, _>>()
                .map(StructuralValue::List)
        }
        TypeDescriptor::Mapping { key, value } => {
            let entries = v.as_object().ok_or_else(|| ConstructionError::mismatch(path, "object", v))?;
            let mut out = IndexMap::with_capacity(entries.len());
            for (k, item) in entries {
                let item_path = format!("{path}/{k}");
                check_key(key, k, &item_path)?;
                out.insert(k.clone(), build(value, item, &item_path)?);
            }
            Ok(StructuralValue::Map(out))
        }
        TypeDescriptor::Record(r) => build_record(r, v, path).map(StructuralValue::Record),
        TypeDescriptor::Enumeration(e) => construct_enum(e, v).map(StructuralValue::Enum),
        TypeDescriptor::Path => match v {
            Value::String(s) => Ok(StructuralValue::Path(PathBuf::from(s))),
            other => Err(ConstructionError::mismatch(path, "path string", other)),
        },
        TypeDescriptor::FileData => FileData::from_json(v).map(|fd| StructuralValue::FileData(Box::new(fd))),
    }
}

/// 2^63, the first float past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn build_primitive(kind: Primitive, v: &Value, path: &str) -> Result<StructuralValue, ConstructionError> {
    match (kind, v) {
        (Primitive::String, Value::String(s)) => Ok(StructuralValue::String(s.clone())),
        (Primitive::Boolean, Value::Bool(b)) => Ok(StructuralValue::Bool(*b)),
        (Primitive::Integer, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(StructuralValue::Integer(i));
            }
            if let Some(u) = n.as_u64() {
                return Ok(StructuralValue::Unsigned(u));
            }
            // 4.0 is an integer; 4.5 and floats outside i64 are not
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) => {
                    Ok(StructuralValue::Integer(f as i64))
                }
                _ => Err(ConstructionError::mismatch(path, "integer", v)),
            }
        }
        (Primitive::Number, Value::Number(n)) => n
            .as_f64()
            .map(StructuralValue::Number)
            .ok_or_else(|| ConstructionError::mismatch(path, "number", v)),
        (kind, other) => Err(ConstructionError::mismatch(path, kind.schema_name(), other)),
    }
}

fn build_union(t: &TypeDescriptor, v: &Value, path: &str) -> Result<StructuralValue, ConstructionError> {
    let (members, had_null) = t.split_null();
    if v.is_null() && had_null {
        return Ok(StructuralValue::Null);
    }
    if let [only] = members.as_slice() {
        return build(only, v, path);
    }
    members
        .iter()
        .find_map(|m| build(m, v, path).ok())
        .ok_or_else(|| ConstructionError::NoMatchingAlternative {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        })
}

fn build_record(r: &RecordType, v: &Value, path: &str) -> Result<RecordInstance, ConstructionError> {
    let obj = v.as_object().ok_or_else(|| ConstructionError::mismatch(path, "object", v))?;
    if let Some(unknown) = obj.keys().find(|k| r.field(k).is_none()) {
        return Err(ConstructionError::UnknownField { record: r.name.clone(), field: unknown.clone() });
    }
    let mut fields = IndexMap::with_capacity(r.fields.len());
    for f in &r.fields {
        let value = match (obj.get(&f.name), f.default.value()) {
            (Some(raw), _) => build(&f.ty, raw, &format!("{path}/{}", f.name))?,
            // defaults are trusted as declared, like the plugin's own constructors do
            (None, Some(default)) => StructuralValue::Raw(default.clone()),
            (None, None) => {
                return Err(ConstructionError::MissingField { record: r.name.clone(), field: f.name.clone() });
            }
        };
        fields.insert(f.name.clone(), value);
    }
    Ok(RecordInstance { type_name: r.name.clone(), fields })
}

fn check_key(key: &TypeDescriptor, k: &str, path: &str) -> Result<(), ConstructionError> {
    let as_json = Value::String(k.to_string());
    let ok = match key {
        TypeDescriptor::Primitive { primitive: Primitive::String } | TypeDescriptor::Path | TypeDescriptor::Any => true,
        TypeDescriptor::Primitive { primitive: Primitive::Integer } => k.parse::<i64>().is_ok(),
        TypeDescriptor::Primitive { primitive: Primitive::Number } => k.parse::<f64>().is_ok(),
        TypeDescriptor::Primitive { primitive: Primitive::Boolean } => matches!(k, "true" | "false"),
        TypeDescriptor::Enumeration(e) => {
            return construct_enum(e, &as_json).map(|_| ());
        }
        _ => false,
    };
    if ok { Ok(()) } else { Err(ConstructionError::mismatch(path, format!("{key} key"), &as_json)) }
}
