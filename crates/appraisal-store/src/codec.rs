//! YAML encoding of record files.
use crate::StoreError;
use appraisal_core::Record;
use serde::Serialize;
use serde_yaml::Value;

/// Parses a record file: one record, or a sequence of records.
pub fn parse_records(file: &str, text: &str) -> Result<Vec<Record>, StoreError> {
    let document: Value = serde_yaml::from_str(text).map_err(|source| StoreError::Parse {
        file: file.to_string(),
        source,
    })?;

    let shape = |reason: String| StoreError::Shape {
        file: file.to_string(),
        reason,
    };

    match document {
        Value::Mapping(mapping) => Ok(vec![
            Record::from_mapping(mapping).map_err(|e| shape(e.to_string()))?
        ]),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Mapping(mapping) => Record::from_mapping(mapping)
                    .map_err(|e| shape(format!("item {}: {}", index, e))),
                _ => Err(shape(format!("item {} is not a mapping", index))),
            })
            .collect(),
        Value::Null => Err(shape("document is empty".to_string())),
        _ => Err(shape("expected a record or a list of records".to_string())),
    }
}

/// Block-style YAML in field order, `\n` line breaks. Equal input gives
/// byte-identical output.
pub fn to_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_yaml::to_string(value).map_err(StoreError::Serialize)
}
