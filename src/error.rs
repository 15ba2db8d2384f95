//! Error taxonomy for the type↔schema bridge.
//!
//! Schema-build failures (`VariadicNotSupported`, `UnsupportedType`,
//! `UnsupportedAnnotation`, `InconsistentEnumType`, `UnsupportedResponseType`)
//! mean the plugin itself is malformed. `MalformedSchema` is raised while
//! decoding a foreign schema. `FieldCoercion` is per-request.
use serde_json::Value;

pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("function has variadic arguments, which are not allowed: {}", params.join(", "))]
    VariadicNotSupported { params: Vec<String> },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("unsupported annotation `{annotation}`: {reason}")]
    UnsupportedAnnotation {
        annotation: String,
        reason: String,
    },

    #[error("enum {name} must have consistent types, found mixes: {}", kinds.join(", "))]
    InconsistentEnumType {
        name: String,
        kinds: Vec<String>,
    },

    #[error("unsupported response type: {0}")]
    UnsupportedResponseType(String),

    #[error("malformed schema at {path}: {reason}")]
    MalformedSchema {
        path: String,
        reason: String,
    },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("failed to map input for field {field}: {value}: {source}")]
    FieldCoercion {
        field: String,
        value: Value,
        #[source]
        source: ConstructionError,
    },
}

impl SchemaError {
    pub(crate) fn unsupported_annotation(annotation: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::UnsupportedAnnotation {
            annotation: annotation.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(path: &str, reason: impl Into<String>) -> Self {
        SchemaError::MalformedSchema {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            reason: reason.into(),
        }
    }

    /// The construction error a coercion failure wraps, if any.
    pub fn construction_error(&self) -> Option<&ConstructionError> {
        match self {
            SchemaError::FieldCoercion { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failures while building a record, enumeration or marker value out of raw
/// JSON. Paths are JSON-pointer style, relative to the value being built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("{record}: missing required field `{field}`")]
    MissingField { record: String, field: String },

    #[error("{record}: unexpected field `{field}`")]
    UnknownField { record: String, field: String },

    #[error("at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("{value} is not a valid {name}")]
    InvalidEnumValue { name: String, value: Value },

    #[error("at {path}: value matches none of the union alternatives")]
    NoMatchingAlternative { path: String },

    #[error("invalid file data: {0}")]
    FileData(String),
}

impl ConstructionError {
    pub(crate) fn mismatch(path: &str, expected: impl Into<String>, found: &Value) -> Self {
        ConstructionError::TypeMismatch {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            expected: expected.into(),
            found: json_kind(found).to_string(),
        }
    }
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
