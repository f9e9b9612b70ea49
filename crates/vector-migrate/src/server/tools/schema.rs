//! The `schema_recommendation` tool.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Map, Value};

use crate::core::StoreKind;
use crate::error::{MigrateError, Result};
use crate::mapper::recommend;
use crate::server::{Tool, ToolRegistry};

/// Heuristic schema mapping recommendations between two store kinds.
pub struct SchemaRecommendationTool;

impl SchemaRecommendationTool {
    pub fn new() -> Self {
        Self
    }

    /// Add the tool to a registry.
    pub fn register(self, registry: &ToolRegistry) -> Result<()> {
        registry.register(Tool {
            name: "schema_recommendation".to_string(),
            description:
                "Get schema mapping recommendations for migrating between vector databases"
                    .to_string(),
            input_schema: input_schema(),
            handler: Arc::new(|_ctx, params| async move { execute(params).await }.boxed()),
        })
    }
}

impl Default for SchemaRecommendationTool {
    fn default() -> Self {
        Self::new()
    }
}

fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "source_type": {
                "type": "string",
                "description": "Source database type",
                "enum": ["pinecone", "qdrant", "weaviate", "milvus"]
            },
            "target_type": {
                "type": "string",
                "description": "Target database type",
                "enum": ["pinecone", "qdrant", "weaviate", "milvus"]
            },
            "source_schema": {
                "type": "object",
                "description": "Source database schema (field names and types)",
                "additionalProperties": {"type": "string"}
            }
        },
        "required": ["source_type", "target_type"]
    })
}

fn kind_param(params: &Map<String, Value>, key: &str) -> Result<StoreKind> {
    let raw = params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MigrateError::validation(format!("{} is required", key)))?;

    raw.parse::<StoreKind>()
        .map_err(|_| MigrateError::validation(format!("invalid {}: {}", key, raw)))
}

async fn execute(params: Map<String, Value>) -> Result<Value> {
    let source_type = kind_param(&params, "source_type")?;
    let target_type = kind_param(&params, "target_type")?;

    if source_type == target_type {
        return Err(MigrateError::validation(
            "source_type and target_type must be different",
        ));
    }

    let source_schema = params.get("source_schema").and_then(Value::as_object);

    let recommendation = recommend(source_type, target_type, source_schema);
    Ok(serde_json::to_value(recommendation)?)
}
