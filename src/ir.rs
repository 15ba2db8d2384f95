// Strongly-typed descriptors of plugin parameter and return types.
//
// Everything the bridge understands is one `TypeDescriptor` variant; anything
// else is rejected when annotations are resolved.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    String,
    Boolean,
    Integer,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Primitive { primitive: Primitive },
    None,
    Any,
    Optional { inner: Box<TypeDescriptor> },
    Union { members: Vec<TypeDescriptor> },
    List { element: Box<TypeDescriptor> },
    Mapping { key: Box<TypeDescriptor>, value: Box<TypeDescriptor> },
    Record(RecordType),
    Enumeration(EnumType),
    Path,
    FileData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default, skip_serializing_if = "FieldDefault::is_missing")]
    pub default: FieldDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub label: String,
    pub value: Value,
}

/// A declared default. `Missing` is the only signal that a field or
/// parameter is required; `Value(Value::Null)` is an explicit `None` default.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    #[default]
    Missing,
    Value(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    Positional,
    VarPositional,
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default, skip_serializing_if = "FieldDefault::is_missing")]
    pub default: FieldDefault,
    #[serde(default)]
    pub kind: ParamKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Parameter>,
    /// `TypeDescriptor::None` when the function returns nothing.
    pub returns: TypeDescriptor,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Primitive {
    pub fn schema_name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
        }
    }

    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Primitive::String),
            "boolean" => Some(Primitive::Boolean),
            "integer" => Some(Primitive::Integer),
            "number" => Some(Primitive::Number),
            _ => None,
        }
    }

    /// Kind of a scalar JSON value, if it is one.
    pub fn of_value(v: &Value) -> Option<Self> {
        match v {
            Value::String(_) => Some(Primitive::String),
            Value::Bool(_) => Some(Primitive::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Primitive::Integer),
            Value::Number(_) => Some(Primitive::Number),
            _ => None,
        }
    }

    pub fn admits(self, v: &Value) -> bool {
        match (self, v) {
            (Primitive::String, Value::String(_)) => true,
            (Primitive::Boolean, Value::Bool(_)) => true,
            (Primitive::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Primitive::Number, Value::Number(_)) => true,
            _ => false,
        }
    }
}

impl TypeDescriptor {
    pub fn string() -> Self { TypeDescriptor::Primitive { primitive: Primitive::String } }
    pub fn boolean() -> Self { TypeDescriptor::Primitive { primitive: Primitive::Boolean } }
    pub fn integer() -> Self { TypeDescriptor::Primitive { primitive: Primitive::Integer } }
    pub fn number() -> Self { TypeDescriptor::Primitive { primitive: Primitive::Number } }

    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional { inner: Box::new(inner) }
    }

    pub fn union(members: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        TypeDescriptor::Union { members: members.into_iter().collect() }
    }

    pub fn list(element: TypeDescriptor) -> Self {
        TypeDescriptor::List { element: Box::new(element) }
    }

    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Mapping { key: Box::new(key), value: Box::new(value) }
    }

    pub fn record(name: impl Into<String>, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        TypeDescriptor::Record(RecordType {
            name: name.into(),
            fields: fields.into_iter().collect(),
        })
    }

    /// Enumeration whose values double as labels.
    pub fn literal(name: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        TypeDescriptor::Enumeration(EnumType {
            name: name.into(),
            members: values
                .into_iter()
                .map(|value| EnumMember { label: label_of(&value), value })
                .collect(),
        })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TypeDescriptor::None)
    }

    /// Members of `Optional`/`Union` with `NoneType` removed, and whether
    /// one was removed. Non-union types come back as a single member.
    pub fn split_null(&self) -> (Vec<&TypeDescriptor>, bool) {
        match self {
            TypeDescriptor::Optional { inner } => {
                let (mut members, _) = inner.split_null();
                members.retain(|m| !m.is_none());
                (members, true)
            }
            TypeDescriptor::Union { members } => {
                let mut had_null = false;
                let mut out = Vec::with_capacity(members.len());
                for m in members {
                    let (inner, null) = m.split_null();
                    had_null |= null || m.is_none();
                    out.extend(inner.into_iter().filter(|t| !t.is_none()));
                }
                (out, had_null)
            }
            other => (vec![other], false),
        }
    }

    /// True when `None` is an accepted value.
    pub fn is_optional(&self) -> bool {
        match self {
            TypeDescriptor::None | TypeDescriptor::Any => true,
            TypeDescriptor::Optional { .. } => true,
            TypeDescriptor::Union { .. } => self.split_null().1,
            _ => false,
        }
    }

    /// Equality that ignores nominal identity: record and enumeration names,
    /// enumeration labels, and `Optional[X]` vs `Union[X, None]` spelling.
    pub fn structurally_eq(&self, other: &TypeDescriptor) -> bool {
        use TypeDescriptor as T;
        match (self, other) {
            (T::Optional { .. } | T::Union { .. }, _) | (_, T::Optional { .. } | T::Union { .. }) => {
                let (a, a_null) = self.split_null();
                let (b, b_null) = other.split_null();
                a_null == b_null
                    && a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.structurally_eq(y))
            }
            (T::Primitive { primitive: a }, T::Primitive { primitive: b }) => a == b,
            (T::None, T::None) | (T::Any, T::Any) | (T::Path, T::Path) | (T::FileData, T::FileData) => true,
            (T::List { element: a }, T::List { element: b }) => a.structurally_eq(b),
            (T::Mapping { key: ak, value: av }, T::Mapping { key: bk, value: bv }) => {
                ak.structurally_eq(bk) && av.structurally_eq(bv)
            }
            (T::Record(a), T::Record(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(b.fields.iter()).all(|(x, y)| {
                        x.name == y.name && x.default == y.default && x.ty.structurally_eq(&y.ty)
                    })
            }
            (T::Enumeration(a), T::Enumeration(b)) => {
                a.members.len() == b.members.len()
                    && a.members.iter().zip(b.members.iter()).all(|(x, y)| x.value == y.value)
            }
            _ => false,
        }
    }
}

impl RecordType {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.default.is_missing()).map(|f| f.name.as_str())
    }
}

impl EnumType {
    pub fn contains(&self, value: &Value) -> bool {
        self.members.iter().any(|m| &m.value == value)
    }

    pub fn member(&self, value: &Value) -> Option<&EnumMember> {
        self.members.iter().find(|m| &m.value == value)
    }
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        FieldDescriptor { name: name.into(), ty, default: FieldDefault::Missing }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(default.into());
        self
    }
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Parameter {
            name: name.into(),
            ty,
            default: FieldDefault::Missing,
            kind: ParamKind::Positional,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(default.into());
        self
    }

    pub fn variadic(name: impl Into<String>, kind: ParamKind) -> Self {
        Parameter {
            name: name.into(),
            ty: TypeDescriptor::Any,
            default: FieldDefault::Missing,
            kind,
        }
    }

    /// `*args` / `**kwargs` rendering used in error messages.
    pub fn display_name(&self) -> String {
        match self.kind {
            ParamKind::Positional => self.name.clone(),
            ParamKind::VarPositional => format!("*{}", self.name),
            ParamKind::VarKeyword => format!("**{}", self.name),
        }
    }
}

impl FieldDefault {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldDefault::Missing)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldDefault::Missing => None,
            FieldDefault::Value(v) => Some(v),
        }
    }
}

impl From<Option<Value>> for FieldDefault {
    fn from(v: Option<Value>) -> Self {
        match v {
            Some(v) => FieldDefault::Value(v),
            None => FieldDefault::Missing,
        }
    }
}

// A present `null` is a real default; only an absent key means `Missing`.
impl Serialize for FieldDefault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldDefault::Missing => serializer.serialize_none(),
            FieldDefault::Value(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FieldDefault {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldDefault::Value)
    }
}

pub(crate) fn label_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Annotation-style rendering, used in error messages.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive { primitive } => f.write_str(match primitive {
                Primitive::String => "str",
                Primitive::Boolean => "bool",
                Primitive::Integer => "int",
                Primitive::Number => "float",
            }),
            TypeDescriptor::None => f.write_str("None"),
            TypeDescriptor::Any => f.write_str("Any"),
            TypeDescriptor::Optional { inner } => write!(f, "Optional[{inner}]"),
            TypeDescriptor::Union { members } => {
                f.write_str("Union[")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{m}")?;
                }
                f.write_str("]")
            }
            TypeDescriptor::List { element } => write!(f, "list[{element}]"),
            TypeDescriptor::Mapping { key, value } => write!(f, "dict[{key}, {value}]"),
            TypeDescriptor::Record(r) => f.write_str(&r.name),
            TypeDescriptor::Enumeration(e) => f.write_str(&e.name),
            TypeDescriptor::Path => f.write_str("Path"),
            TypeDescriptor::FileData => f.write_str("FileData"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NATIVE TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Rust types that map onto a `TypeDescriptor` without a textual annotation.
pub trait Describe {
    fn describe() -> TypeDescriptor;
}

macro_rules! describe_as {
    ($ctor:ident: $($t:ty),*) => {
        $(impl Describe for $t {
            fn describe() -> TypeDescriptor { TypeDescriptor::$ctor() }
        })*
    };
}

describe_as!(string: String);
describe_as!(boolean: bool);
describe_as!(integer: i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
describe_as!(number: f32, f64);

impl Describe for () {
    fn describe() -> TypeDescriptor { TypeDescriptor::None }
}

impl Describe for Value {
    fn describe() -> TypeDescriptor { TypeDescriptor::Any }
}

impl Describe for PathBuf {
    fn describe() -> TypeDescriptor { TypeDescriptor::Path }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor { TypeDescriptor::optional(T::describe()) }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor { TypeDescriptor::list(T::describe()) }
}

impl<K: Describe, V: Describe, S> Describe for HashMap<K, V, S> {
    fn describe() -> TypeDescriptor { TypeDescriptor::mapping(K::describe(), V::describe()) }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor { TypeDescriptor::mapping(K::describe(), V::describe()) }
}

impl<K: Describe, V: Describe, S> Describe for IndexMap<K, V, S> {
    fn describe() -> TypeDescriptor { TypeDescriptor::mapping(K::describe(), V::describe()) }
}
