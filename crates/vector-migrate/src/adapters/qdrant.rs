//! Qdrant HTTP adapter.
//!
//! Reads use the scroll API ordered by point id. Qdrant's scroll offset is
//! inclusive of the offset point, so the cursor record is filtered out of
//! every page to honour the strictly-after pagination contract. Writes pass
//! `wait=true` so an acknowledged upsert is durable before the next
//! checkpoint can cover it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::response_error;
use crate::config::StoreConfig;
use crate::core::{Record, StoreKind, StoreStats, VectorStore};
use crate::error::{MigrateError, Result};

/// Qdrant adapter.
pub struct QdrantStore {
    config: StoreConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct QdrantPoint {
    id: Value,
    #[serde(default)]
    vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    payload: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct ScrollRequest {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<Value>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    #[serde(default)]
    result: ScrollResult,
}

#[derive(Debug, Default, Deserialize)]
struct ScrollResult {
    #[serde(default)]
    points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest {
    points: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    result: CollectionResult,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionResult {
    #[serde(default)]
    points_count: Option<i64>,
    #[serde(default)]
    vectors_count: Option<i64>,
    #[serde(default)]
    config: CollectionConfig,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionConfig {
    #[serde(default)]
    params: CollectionParams,
}

#[derive(Debug, Default, Deserialize)]
struct CollectionParams {
    #[serde(default)]
    vectors: VectorParams,
}

#[derive(Debug, Default, Deserialize)]
struct VectorParams {
    #[serde(default)]
    size: usize,
}

impl QdrantStore {
    /// Build an adapter from configuration. Does not touch the network;
    /// call [`connect`](VectorStore::connect) to validate reachability.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.kind != StoreKind::Qdrant {
            return Err(MigrateError::Config(format!(
                "expected kind 'qdrant', got '{}'",
                config.kind
            )));
        }
        if config.url.is_empty() {
            return Err(MigrateError::Config("qdrant url is required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let base_url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url, self.config.index, suffix
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.header("api-key", &self.config.api_key)
        }
    }

    /// Qdrant point ids are unsigned integers or UUID strings; numeric ids
    /// roundtrip as numbers so re-upserts hit the same point.
    fn point_id(id: &str) -> Value {
        id.parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(id.to_string()))
    }

    fn id_string(id: &Value) -> String {
        match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn record_from(point: QdrantPoint) -> Record {
        Record {
            id: Self::id_string(&point.id),
            vector: point.vector,
            metadata: point.payload,
        }
    }

    fn point_from(record: &Record) -> QdrantPoint {
        QdrantPoint {
            id: Self::point_id(&record.id),
            vector: record.vector.clone(),
            payload: record.metadata.clone(),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn connect(&self) -> Result<()> {
        self.validate_connection().await
    }

    async fn close(&self) {}

    async fn get_batch(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<Record>> {
        let request = ScrollRequest {
            // The offset point comes back inclusively; over-fetch by one so
            // filtering it out still yields a full page.
            limit: limit + usize::from(after_id.is_some()),
            offset: after_id.map(Self::point_id),
            with_payload: true,
            with_vector: true,
        };

        let response = self
            .request(self.client.post(self.collection_url("/points/scroll")))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("qdrant", response).await);
        }

        let scroll: ScrollResponse = response.json().await?;
        let mut records: Vec<Record> = scroll
            .result
            .points
            .into_iter()
            .map(Self::record_from)
            .collect();

        if let Some(after) = after_id {
            records.retain(|r| r.id != after);
        }
        records.truncate(limit);

        Ok(records)
    }

    async fn upsert_batch(&self, records: &[Record]) -> Result<()> {
        let payload = UpsertRequest {
            points: records.iter().map(Self::point_from).collect(),
        };

        let response = self
            .request(self.client.put(self.collection_url("/points?wait=true")))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("qdrant", response).await);
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        let payload = DeleteRequest {
            points: ids.iter().map(|id| Self::point_id(id)).collect(),
        };

        let response = self
            .request(
                self.client
                    .post(self.collection_url("/points/delete?wait=true")),
            )
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("qdrant", response).await);
        }
        Ok(())
    }

    async fn validate_connection(&self) -> Result<()> {
        let response = self
            .request(self.client.get(self.collection_url("")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("qdrant", response).await);
        }
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let response = self
            .request(self.client.get(self.collection_url("")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("qdrant", response).await);
        }

        let info: CollectionInfo = response.json().await?;
        let total = info
            .result
            .points_count
            .or(info.result.vectors_count)
            .unwrap_or(0);

        Ok(StoreStats {
            total_records: total,
            dimensions: info.result.config.params.vectors.size,
            index_kind: "qdrant-hnsw".to_string(),
            // Not reported by the API.
            memory_bytes: 0,
        })
    }

    fn source_url(&self) -> &str {
        &self.config.url
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Qdrant
    }
}
