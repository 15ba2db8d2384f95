//! The ingestion "file data" marker type.
//!
//! `FileData` is a concrete struct, not a generic record: it encodes with an
//! `is_file_data` flag and decodes back to `TypeDescriptor::FileData`.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ConstructionError;
use crate::ir::{Describe, FieldDescriptor, TypeDescriptor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    pub identifier: String,
    pub connector_type: String,
    #[serde(default)]
    pub source_identifiers: Option<SourceIdentifiers>,
    #[serde(default = "default_doc_type")]
    pub doc_type: String,
    #[serde(default)]
    pub metadata: FileDataSourceMetadata,
    #[serde(default)]
    pub additional_metadata: IndexMap<String, Value>,
    #[serde(default)]
    pub reprocess: bool,
    #[serde(default)]
    pub local_download_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceIdentifiers {
    pub filename: String,
    pub fullpath: String,
    #[serde(default)]
    pub rel_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileDataSourceMetadata {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub record_locator: Option<IndexMap<String, Value>>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_modified: Option<String>,
    #[serde(default)]
    pub date_processed: Option<String>,
    #[serde(default)]
    pub permissions_data: Option<Vec<IndexMap<String, Value>>>,
    #[serde(default)]
    pub filesize_bytes: Option<i64>,
}

fn default_doc_type() -> String {
    "file".to_string()
}

impl FileData {
    pub fn new(identifier: impl Into<String>, connector_type: impl Into<String>) -> Self {
        FileData {
            identifier: identifier.into(),
            connector_type: connector_type.into(),
            source_identifiers: None,
            doc_type: default_doc_type(),
            metadata: FileDataSourceMetadata::default(),
            additional_metadata: IndexMap::new(),
            reprocess: false,
            local_download_path: None,
        }
    }

    /// Structural validation of a raw JSON object.
    pub fn from_json(value: &Value) -> Result<Self, ConstructionError> {
        if !value.is_object() {
            return Err(ConstructionError::FileData(format!(
                "expected an object, found {}",
                crate::error::json_kind(value)
            )));
        }
        crate::path_de::from_value_with_path(value).map_err(ConstructionError::FileData)
    }

    pub fn to_json(&self) -> Value {
        // string-keyed maps only, so serialization cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The fixed field set the encoder emits for the marker.
    pub fn fields() -> Vec<FieldDescriptor> {
        let opt_str = || TypeDescriptor::optional(TypeDescriptor::string());
        let any_map = || TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::Any);
        vec![
            FieldDescriptor::new("identifier", TypeDescriptor::string()),
            FieldDescriptor::new("connector_type", TypeDescriptor::string()),
            FieldDescriptor::new("source_identifiers", TypeDescriptor::optional(source_identifiers_descriptor()))
                .with_default(Value::Null),
            FieldDescriptor::new("doc_type", TypeDescriptor::string()).with_default("file"),
            FieldDescriptor::new("metadata", metadata_descriptor()).with_default(metadata_default()),
            FieldDescriptor::new("additional_metadata", any_map()).with_default(json!({})),
            FieldDescriptor::new("reprocess", TypeDescriptor::boolean()).with_default(false),
            FieldDescriptor::new("local_download_path", opt_str()).with_default(Value::Null),
        ]
    }
}

impl Describe for FileData {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::FileData
    }
}

fn source_identifiers_descriptor() -> TypeDescriptor {
    TypeDescriptor::record("SourceIdentifiers", [
        FieldDescriptor::new("filename", TypeDescriptor::string()),
        FieldDescriptor::new("fullpath", TypeDescriptor::string()),
        FieldDescriptor::new("rel_path", TypeDescriptor::optional(TypeDescriptor::string())).with_default(Value::Null),
    ])
}

fn metadata_descriptor() -> TypeDescriptor {
    let opt = |t: TypeDescriptor| TypeDescriptor::optional(t);
    let any_map = || TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::Any);
    let fields = [
        ("url", opt(TypeDescriptor::string())),
        ("version", opt(TypeDescriptor::string())),
        ("record_locator", opt(any_map())),
        ("date_created", opt(TypeDescriptor::string())),
        ("date_modified", opt(TypeDescriptor::string())),
        ("date_processed", opt(TypeDescriptor::string())),
        ("permissions_data", opt(TypeDescriptor::list(any_map()))),
        ("filesize_bytes", opt(TypeDescriptor::integer())),
    ];
    TypeDescriptor::record(
        "FileDataSourceMetadata",
        fields.into_iter().map(|(name, ty)| FieldDescriptor::new(name, ty).with_default(Value::Null)),
    )
}

fn metadata_default() -> Value {
    json!({
        "url": null,
        "version": null,
        "record_locator": null,
        "date_created": null,
        "date_modified": null,
        "date_processed": null,
        "permissions_data": null,
        "filesize_bytes": null,
    })
}

// ————————————————————————————————————————————————————————————————————————————
// FILE DATA META
// ————————————————————————————————————————————————————————————————————————————

/// Descriptor of the side-channel a plugin uses to fan one input out into
/// new records, with `new_records[].contents` typed as the plugin's response.
/// Contents default to `None` when the response may be absent.
pub fn filedata_meta_descriptor(response: &TypeDescriptor) -> TypeDescriptor {
    let mut contents = FieldDescriptor::new("contents", response.clone());
    if response.is_optional() {
        contents = contents.with_default(Value::Null);
    }
    let new_record = TypeDescriptor::record("NewRecord", [
        FieldDescriptor::new("file_data", TypeDescriptor::FileData),
        contents,
    ]);
    TypeDescriptor::record("FileDataMeta", [
        FieldDescriptor::new("terminate_current", TypeDescriptor::boolean()).with_default(false),
        FieldDescriptor::new("new_records", TypeDescriptor::list(new_record)).with_default(json!([])),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_minimal_object() {
        let fd = FileData::from_json(&json!({
            "identifier": "custom_file_data",
            "connector_type": "mock_connector",
            "additional_metadata": {"additional": "metadata"},
        }))
        .unwrap();
        assert_eq!(fd.doc_type, "file");
        assert_eq!(fd.additional_metadata["additional"], json!("metadata"));
        assert_eq!(fd.metadata, FileDataSourceMetadata::default());
        assert_eq!(FileData::from_json(&fd.to_json()).unwrap(), fd);
    }

    #[test]
    fn json_form_matches_the_encoded_field_set() {
        let mut fd = FileData::new("id", "local");
        fd.source_identifiers = Some(SourceIdentifiers {
            filename: "a.pdf".into(),
            fullpath: "/in/a.pdf".into(),
            rel_path: None,
        });
        let json = fd.to_json();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        let names: Vec<String> = FileData::fields().into_iter().map(|f| f.name).collect();
        assert_eq!(keys, names.iter().collect::<Vec<_>>());
        assert_eq!(json["metadata"], metadata_default());
        assert_eq!(json["source_identifiers"], json!({"filename": "a.pdf", "fullpath": "/in/a.pdf", "rel_path": null}));
        assert_eq!(json["doc_type"], json!("file"));
    }

    #[test]
    fn missing_identity_is_a_file_data_error() {
        let err = FileData::from_json(&json!({"not": "the", "right": "values"})).unwrap_err();
        let ConstructionError::FileData(msg) = err else { panic!("wrong error kind") };
        assert!(msg.contains("missing field `identifier`"), "{msg}");

        assert!(matches!(FileData::from_json(&json!("nope")), Err(ConstructionError::FileData(_))));
    }

    #[test]
    fn required_fields_are_identifier_and_connector_type() {
        let required: Vec<_> = FileData::fields()
            .into_iter()
            .filter(|f| f.default.is_missing())
            .map(|f| f.name)
            .collect();
        assert_eq!(required, ["identifier", "connector_type"]);
    }

    #[test]
    fn meta_contents_follow_response_optionality() {
        let meta = filedata_meta_descriptor(&TypeDescriptor::optional(TypeDescriptor::string()));
        let TypeDescriptor::Record(meta) = meta else { panic!("expected record") };
        let TypeDescriptor::List { element } = &meta.field("new_records").unwrap().ty else { panic!("expected list") };
        let TypeDescriptor::Record(rec) = element.as_ref() else { panic!("expected record") };
        assert_eq!(rec.field("contents").unwrap().default.value(), Some(&Value::Null));

        let meta = filedata_meta_descriptor(&TypeDescriptor::string());
        let TypeDescriptor::Record(meta) = meta else { panic!("expected record") };
        let TypeDescriptor::List { element } = &meta.field("new_records").unwrap().ty else { panic!("expected list") };
        let TypeDescriptor::Record(rec) = element.as_ref() else { panic!("expected record") };
        assert!(rec.field("contents").unwrap().default.is_missing());
    }
}
