//! Wire-neutral record and store statistics types.
//!
//! A [`Record`] is the unit of migration: an opaque string id, a dense
//! vector, and free-form metadata. The engine only interprets the id (stable
//! ordering cursor) and the vector length (must be uniform per migration);
//! metadata passes through the transformer untouched by the core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MigrateError;

/// A vector record with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable, non-empty identifier. Used as the pagination cursor.
    pub id: String,

    /// Dense embedding vector.
    pub vector: Vec<f32>,

    /// Arbitrary metadata payload.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Record {
    /// Create a record without metadata.
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: Map::new(),
        }
    }

    /// Attach a metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Statistics reported by a vector store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of records in the index/collection.
    pub total_records: i64,

    /// Vector dimensionality.
    pub dimensions: usize,

    /// Index implementation label (e.g. "qdrant-hnsw").
    pub index_kind: String,

    /// Approximate memory footprint, zero when the store does not report it.
    pub memory_bytes: u64,
}

/// Supported vector store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Pinecone,
    Qdrant,
    Weaviate,
    Milvus,
}

impl StoreKind {
    /// All kinds accepted by configuration and the recommendation tool.
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Pinecone,
        StoreKind::Qdrant,
        StoreKind::Weaviate,
        StoreKind::Milvus,
    ];

    /// String form used on the wire and in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Pinecone => "pinecone",
            StoreKind::Qdrant => "qdrant",
            StoreKind::Weaviate => "weaviate",
            StoreKind::Milvus => "milvus",
        }
    }

    /// Whether the store only accepts flat (non-nested) metadata.
    ///
    /// Pinecone rejects nested objects; migrating into or out of it flattens
    /// nested maps with dot notation.
    pub fn flat_metadata_only(&self) -> bool {
        matches!(self, StoreKind::Pinecone)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pinecone" => Ok(StoreKind::Pinecone),
            "qdrant" => Ok(StoreKind::Qdrant),
            "weaviate" => Ok(StoreKind::Weaviate),
            "milvus" => Ok(StoreKind::Milvus),
            other => Err(MigrateError::Config(format!(
                "unsupported store kind: {} (supported: pinecone, qdrant, weaviate, milvus)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_kind_roundtrip() {
        for kind in StoreKind::ALL {
            let parsed: StoreKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_store_kind_rejects_unknown() {
        assert!("chroma".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_record_serialization_skips_empty_metadata() {
        let record = Record::new("rec-1", vec![0.1, 0.2]);
        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("metadata"));

        let with_meta = record.with_metadata("title", json!("hello"));
        let serialized = serde_json::to_string(&with_meta).unwrap();
        assert!(serialized.contains("\"title\":\"hello\""));
    }

    #[test]
    fn test_flat_metadata_only() {
        assert!(StoreKind::Pinecone.flat_metadata_only());
        assert!(!StoreKind::Qdrant.flat_metadata_only());
    }
}
