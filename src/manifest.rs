//! Plugin manifests: the declared types plus one function signature, as a
//! JSON document.
//!
//! ```json
//! {
//!   "types": [
//!     {"record": {"name": "Output", "fields": [{"name": "n", "annotation": "float"}]}}
//!   ],
//!   "function": {
//!     "name": "process",
//!     "params": [{"name": "a", "annotation": "int"}],
//!     "returns": "Optional[Output]"
//!   }
//! }
//! ```
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::ir::FunctionSignature;
use crate::resolve::{Declaration, SignatureDecl, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub types: Vec<Declaration>,
    pub function: SignatureDecl,
}

impl Manifest {
    pub fn from_json_str(src: &str) -> Result<Self> {
        crate::path_de::from_str_with_path(src).map_err(SchemaError::InvalidManifest)
    }

    pub fn registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry.declare_all(self.types.iter().cloned())?;
        Ok(registry)
    }

    /// Declare every type, then resolve the function against them.
    pub fn signature(&self) -> Result<FunctionSignature> {
        self.registry()?.resolve_signature(&self.function)
    }
}
