//! Bidirectional bridge between plugin function signatures and a closed
//! JSON-schema-like grammar: resolve annotations into descriptors, encode
//! them as request/response schemas, validate and decode schema documents,
//! and coerce raw request bodies into typed values.
pub mod annotation;
pub mod builder;
pub mod coerce;
pub mod decode;
pub mod encode;
pub mod error;
pub mod filedata;
pub mod grammar;
pub mod ir;
pub mod manifest;
pub mod model;
pub mod path_de;
pub mod resolve;

pub use builder::{schema_dict, SchemaOptions};
pub use decode::decode;
pub use encode::encode;
pub use error::{ConstructionError, Result, SchemaError};
pub use ir::{Describe, FunctionSignature, Parameter, TypeDescriptor};
pub use model::{validate_payload, StructuralValue};
