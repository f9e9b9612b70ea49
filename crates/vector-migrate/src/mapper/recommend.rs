//! Heuristic schema mapping recommendations between store kinds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::StoreKind;

/// One recommended field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRecommendation {
    pub source_field: String,
    pub target_field: String,
    pub confidence: f64,
    pub conversion_needed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Full recommendation for a migration path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRecommendation {
    pub source_type: StoreKind,
    pub target_type: StoreKind,
    pub field_mappings: Vec<FieldRecommendation>,
    pub overall_confidence: f64,
    pub warnings: Vec<String>,
}

/// Metadata fields seen across most vector store deployments, mapped
/// one-to-one with high confidence.
const COMMON_FIELDS: [(&str, f64, &str); 4] = [
    ("id", 1.0, "Primary identifier, direct mapping"),
    ("title", 0.95, "Common metadata field"),
    ("url", 0.95, "URL reference field"),
    ("content", 0.9, "Main content field"),
];

/// Generate mapping recommendations for a source-to-target path.
///
/// Caller-supplied schema fields that the common-field table does not cover
/// are auto-mapped by name at reduced confidence.
pub fn recommend(
    source_type: StoreKind,
    target_type: StoreKind,
    source_schema: Option<&Map<String, Value>>,
) -> SchemaRecommendation {
    let mut field_mappings: Vec<FieldRecommendation> = COMMON_FIELDS
        .iter()
        .map(|(name, confidence, notes)| FieldRecommendation {
            source_field: name.to_string(),
            target_field: name.to_string(),
            confidence: *confidence,
            conversion_needed: false,
            notes: Some(notes.to_string()),
        })
        .collect();

    let mut warnings = Vec::new();
    let overall_confidence = match (source_type, target_type) {
        (StoreKind::Pinecone, StoreKind::Qdrant) => {
            warnings
                .push("Pinecone flat metadata will be flattened in Qdrant with dot notation".into());
            0.9
        }
        (StoreKind::Pinecone, StoreKind::Weaviate) => {
            warnings.push("Weaviate requires schema definition before upsert".into());
            warnings.push(
                "Nested metadata not supported in Pinecone, but supported in Weaviate".into(),
            );
            0.85
        }
        (StoreKind::Qdrant, StoreKind::Pinecone) => {
            warnings.push("Qdrant nested payloads must be flattened for Pinecone".into());
            warnings.push("Nested keys collapse to dot notation (author.name)".into());
            0.85
        }
        (StoreKind::Weaviate, StoreKind::Pinecone) => {
            warnings.push("Weaviate typed properties will become untyped in Pinecone".into());
            warnings.push("Type information will be lost".into());
            0.8
        }
        _ => {
            warnings.push("Generic migration path - review mappings carefully".into());
            0.75
        }
    };

    if let Some(schema) = source_schema {
        for field_name in schema.keys() {
            let already_covered = field_mappings
                .iter()
                .any(|mapping| mapping.source_field == *field_name);

            if !already_covered {
                field_mappings.push(FieldRecommendation {
                    source_field: field_name.clone(),
                    target_field: field_name.clone(),
                    confidence: 0.7,
                    conversion_needed: false,
                    notes: Some("Auto-mapped by name - verify type compatibility".into()),
                });
            }
        }
    }

    SchemaRecommendation {
        source_type,
        target_type,
        field_mappings,
        overall_confidence,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pinecone_to_qdrant() {
        let rec = recommend(StoreKind::Pinecone, StoreKind::Qdrant, None);

        assert_eq!(rec.source_type, StoreKind::Pinecone);
        assert_eq!(rec.target_type, StoreKind::Qdrant);
        assert!(!rec.field_mappings.is_empty());
        assert!(rec.overall_confidence > 0.0 && rec.overall_confidence <= 1.0);
        assert!(!rec.warnings.is_empty());
    }

    #[test]
    fn test_generic_path_warns() {
        let rec = recommend(StoreKind::Milvus, StoreKind::Weaviate, None);
        assert_eq!(rec.overall_confidence, 0.75);
        assert!(rec.warnings[0].contains("Generic migration path"));
    }

    #[test]
    fn test_id_mapped_with_full_confidence() {
        let rec = recommend(StoreKind::Qdrant, StoreKind::Pinecone, None);
        let id_mapping = rec
            .field_mappings
            .iter()
            .find(|m| m.source_field == "id")
            .unwrap();
        assert_eq!(id_mapping.confidence, 1.0);
    }

    #[test]
    fn test_source_schema_fields_auto_mapped() {
        let mut schema = Map::new();
        schema.insert("category".to_string(), json!("string"));
        schema.insert("title".to_string(), json!("string"));

        let rec = recommend(StoreKind::Pinecone, StoreKind::Qdrant, Some(&schema));

        let category = rec
            .field_mappings
            .iter()
            .find(|m| m.source_field == "category")
            .unwrap();
        assert_eq!(category.confidence, 0.7);

        // "title" is already covered by the common table; no duplicate entry.
        let title_count = rec
            .field_mappings
            .iter()
            .filter(|m| m.source_field == "title")
            .count();
        assert_eq!(title_count, 1);
    }
}
