//! Pure record transformation under a schema mapping.

use serde_json::{Map, Value};

use super::SchemaMapping;
use crate::core::Record;
use crate::error::{MigrateError, Result};

/// Transform one record under the mapping.
///
/// `id` and `vector` pass through unchanged. Metadata fields are renamed per
/// the mapping (fields without an explicit rename pass through under their
/// source name), declared defaults fill in missing fields, converters run on
/// their target fields, and nested objects are flattened to dot-notation
/// keys when the mapping requires flat metadata.
pub fn map_record(record: &Record, mapping: &SchemaMapping) -> Result<Record> {
    let mut metadata = Map::with_capacity(record.metadata.len());

    for (key, value) in &record.metadata {
        let target_key = mapping
            .field_mappings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.clone());
        metadata.insert(target_key, value.clone());
    }

    for (field, default) in &mapping.default_values {
        metadata
            .entry(field.clone())
            .or_insert_with(|| default.clone());
    }

    for (field, conversion) in &mapping.type_conversions {
        if let Some(value) = metadata.get(field) {
            let converted = conversion.converter.apply(value).map_err(|e| {
                MigrateError::transform(
                    &record.id,
                    format!("failed to convert field {}: {}", field, e),
                )
            })?;
            metadata.insert(field.clone(), converted);
        }
    }

    if mapping.requires_flattening() {
        metadata = flatten_metadata(metadata);
    }

    Ok(Record {
        id: record.id.clone(),
        vector: record.vector.clone(),
        metadata,
    })
}

/// Transform a batch, preserving order. Fails on the first bad record with
/// its id surfaced in the error.
pub fn map_batch(records: &[Record], mapping: &SchemaMapping) -> Result<Vec<Record>> {
    records
        .iter()
        .map(|record| map_record(record, mapping))
        .collect()
}

/// Flatten one level of nested objects with dot notation:
/// `{ a: { b: v } }` becomes `{ "a.b": v }`. Arrays and primitives pass
/// through unchanged.
fn flatten_metadata(metadata: Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::with_capacity(metadata.len());

    for (key, value) in metadata {
        match value {
            Value::Object(nested) => {
                for (sub_key, sub_value) in nested {
                    flat.insert(format!("{}.{}", key, sub_key), sub_value);
                }
            }
            other => {
                flat.insert(key, other);
            }
        }
    }

    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreKind;
    use crate::mapper::{Converter, TypeConversion};
    use serde_json::json;

    fn sample_record() -> Record {
        Record::new("rec-1", vec![0.1, 0.2, 0.3])
            .with_metadata("title", json!("hello"))
            .with_metadata("views", json!(12.0))
    }

    fn qdrant_to_weaviate() -> SchemaMapping {
        SchemaMapping::identity(StoreKind::Qdrant, StoreKind::Weaviate)
    }

    #[test]
    fn test_id_and_vector_pass_through() {
        let record = sample_record();
        let mapped = map_record(&record, &qdrant_to_weaviate()).unwrap();
        assert_eq!(mapped.id, "rec-1");
        assert_eq!(mapped.vector, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_field_rename() {
        let mut mapping = qdrant_to_weaviate();
        mapping
            .field_mappings
            .insert("title".into(), "heading".into());

        let mapped = map_record(&sample_record(), &mapping).unwrap();
        assert_eq!(mapped.metadata["heading"], json!("hello"));
        assert!(!mapped.metadata.contains_key("title"));
        // Unmapped fields pass through under their source name.
        assert_eq!(mapped.metadata["views"], json!(12.0));
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let mut mapping = qdrant_to_weaviate();
        mapping
            .default_values
            .insert("language".into(), json!("en"));
        mapping.default_values.insert("title".into(), json!("untitled"));

        let mapped = map_record(&sample_record(), &mapping).unwrap();
        // Missing field gets the default; present field keeps its value.
        assert_eq!(mapped.metadata["language"], json!("en"));
        assert_eq!(mapped.metadata["title"], json!("hello"));
    }

    #[test]
    fn test_converter_applies_to_target_field() {
        let mut mapping = qdrant_to_weaviate();
        mapping.type_conversions.insert(
            "views".into(),
            TypeConversion {
                from_type: "float64".into(),
                to_type: "integer".into(),
                converter: Converter::NumberAuto,
            },
        );

        let mapped = map_record(&sample_record(), &mapping).unwrap();
        assert_eq!(mapped.metadata["views"], json!(12));
    }

    #[test]
    fn test_converter_failure_surfaces_record_id() {
        let mut mapping = qdrant_to_weaviate();
        mapping.type_conversions.insert(
            "title".into(),
            TypeConversion {
                from_type: "string".into(),
                to_type: "number".into(),
                converter: Converter::ParseNumber,
            },
        );

        let err = map_record(&sample_record(), &mapping).unwrap_err();
        match err {
            MigrateError::Transform { record_id, message } => {
                assert_eq!(record_id, "rec-1");
                assert!(message.contains("title"));
            }
            other => panic!("expected Transform error, got {:?}", other),
        }
    }

    #[test]
    fn test_flattening_into_pinecone() {
        let mapping = SchemaMapping::identity(StoreKind::Qdrant, StoreKind::Pinecone);
        let record = Record::new("rec-2", vec![1.0])
            .with_metadata("author", json!({"name": "ada", "id": 7}))
            .with_metadata("tags", json!(["a", "b"]));

        let mapped = map_record(&record, &mapping).unwrap();
        assert_eq!(mapped.metadata["author.name"], json!("ada"));
        assert_eq!(mapped.metadata["author.id"], json!(7));
        // Arrays are kept as-is.
        assert_eq!(mapped.metadata["tags"], json!(["a", "b"]));
        assert!(!mapped.metadata.contains_key("author"));
    }

    #[test]
    fn test_no_flattening_between_nested_stores() {
        let mapping = qdrant_to_weaviate();
        let record =
            Record::new("rec-3", vec![1.0]).with_metadata("author", json!({"name": "ada"}));

        let mapped = map_record(&record, &mapping).unwrap();
        assert_eq!(mapped.metadata["author"], json!({"name": "ada"}));
    }

    #[test]
    fn test_map_batch_preserves_order() {
        let records = vec![
            Record::new("a", vec![1.0]),
            Record::new("b", vec![2.0]),
            Record::new("c", vec![3.0]),
        ];

        let mapped = map_batch(&records, &qdrant_to_weaviate()).unwrap();
        let ids: Vec<&str> = mapped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_map_batch_fails_on_bad_record() {
        let mut mapping = qdrant_to_weaviate();
        mapping.type_conversions.insert(
            "views".into(),
            TypeConversion {
                from_type: "string".into(),
                to_type: "number".into(),
                converter: Converter::ParseNumber,
            },
        );

        let records = vec![
            Record::new("good", vec![1.0]).with_metadata("views", json!("10")),
            Record::new("bad", vec![2.0]).with_metadata("views", json!("oops")),
        ];

        let err = map_batch(&records, &mapping).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }
}
