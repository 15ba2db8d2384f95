//! Raw request body → typed parameter values.
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{ConstructionError, Result, SchemaError};
use crate::filedata::FileData;
use crate::ir::{FunctionSignature, TypeDescriptor};
use crate::model::{construct_record, StructuralValue};

/// Turn the raw values of declared record and file-data parameters into
/// constructed instances. Everything else, including parameters the
/// signature does not declare, is carried over as-is; absent parameters stay
/// absent. `raw` itself is never modified.
pub fn coerce(sig: &FunctionSignature, raw: &Map<String, Value>) -> Result<IndexMap<String, StructuralValue>> {
    let mut out: IndexMap<String, StructuralValue> =
        raw.iter().map(|(k, v)| (k.clone(), StructuralValue::Raw(v.clone()))).collect();

    for param in &sig.params {
        let Some(value) = raw.get(&param.name) else { continue };
        let coerced = coerce_value(&param.ty, value).map_err(|source| SchemaError::FieldCoercion {
            field: param.name.clone(),
            value: value.clone(),
            source,
        })?;
        if let Some(coerced) = coerced {
            tracing::trace!(field = %param.name, ty = %param.ty, "coerced input");
            out.insert(param.name.clone(), coerced);
        }
    }
    Ok(out)
}

/// `None` means "leave the raw value alone". Enumeration members are checked
/// when the record holding them is built, not here.
fn coerce_value(t: &TypeDescriptor, value: &Value) -> std::result::Result<Option<StructuralValue>, ConstructionError> {
    match (t, value) {
        (TypeDescriptor::Record(r), Value::Object(_)) => construct_record(r, value).map(|r| Some(StructuralValue::Record(r))),
        (TypeDescriptor::FileData, _) => FileData::from_json(value).map(|fd| Some(StructuralValue::FileData(Box::new(fd)))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FieldDescriptor, Parameter};
    use crate::model::RecordInstance;
    use serde_json::json;

    fn signature() -> FunctionSignature {
        let a = TypeDescriptor::record("A", [
            FieldDescriptor::new("b", TypeDescriptor::integer()),
            FieldDescriptor::new("c", TypeDescriptor::number()),
        ]);
        FunctionSignature {
            name: "process".into(),
            params: vec![
                Parameter::new("a", a),
                Parameter::new("color", TypeDescriptor::literal("Color", [json!("red"), json!("blue")])),
                Parameter::new("file_data", TypeDescriptor::FileData),
                Parameter::new("n", TypeDescriptor::integer()).with_default(1),
            ],
            returns: TypeDescriptor::None,
        }
    }

    fn raw(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn records_are_constructed_from_mappings() {
        let input = raw(json!({"a": {"b": 4, "c": 5.6}}));
        let out = coerce(&signature(), &input).unwrap();
        let expected = RecordInstance {
            type_name: "A".into(),
            fields: IndexMap::from([
                ("b".to_string(), StructuralValue::Integer(4)),
                ("c".to_string(), StructuralValue::Number(5.6)),
            ]),
        };
        assert_eq!(out["a"], StructuralValue::Record(expected));
        assert_eq!(out.len(), 1);
        assert_eq!(input, raw(json!({"a": {"b": 4, "c": 5.6}})));
    }

    #[test]
    fn enums_and_unknown_keys_pass_through() {
        let out = coerce(&signature(), &raw(json!({"color": "green", "extra": [1, 2]}))).unwrap();
        assert_eq!(out["color"], StructuralValue::Raw(json!("green")));
        assert_eq!(out["extra"], StructuralValue::Raw(json!([1, 2])));
        assert!(!out.contains_key("n"));
    }

    #[test]
    fn non_mapping_record_values_are_left_alone() {
        let out = coerce(&signature(), &raw(json!({"a": "not a record"}))).unwrap();
        assert_eq!(out["a"], StructuralValue::Raw(json!("not a record")));
    }

    #[test]
    fn failures_keep_the_construction_error_kind() {
        let err = coerce(&signature(), &raw(json!({"a": {"b": 4}}))).unwrap_err();
        assert_eq!(
            err.construction_error(),
            Some(&ConstructionError::MissingField { record: "A".into(), field: "c".into() })
        );
        assert!(err.to_string().starts_with("failed to map input for field a: {\"b\":4}"));

        let err = coerce(&signature(), &raw(json!({"file_data": {"not": "the", "right": "values"}}))).unwrap_err();
        assert!(matches!(err.construction_error(), Some(ConstructionError::FileData(_))));
    }

    #[test]
    fn file_data_is_constructed() {
        let out = coerce(
            &signature(),
            &raw(json!({"file_data": {"identifier": "id", "connector_type": "local"}})),
        )
        .unwrap();
        let StructuralValue::FileData(fd) = &out["file_data"] else { panic!("expected file data") };
        assert_eq!(fd.identifier, "id");
        assert_eq!(fd.doc_type, "file");
    }
}
