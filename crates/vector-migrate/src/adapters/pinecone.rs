//! Pinecone HTTP adapter.
//!
//! Pagination rides on Pinecone's list endpoint with the cursor passed as
//! `pagination_token`; upserts go through the bulk upsert endpoint, which is
//! insert-or-replace by id.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::response_error;
use crate::config::StoreConfig;
use crate::core::{Record, StoreKind, StoreStats, VectorStore};
use crate::error::{MigrateError, Result};

const PINECONE_API_BASE: &str = "https://api.pinecone.io";

/// Pinecone adapter.
pub struct PineconeStore {
    config: StoreConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<PineconeVector>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    vectors: Vec<PineconeVector>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct IndexInfo {
    #[serde(default)]
    database: IndexDatabase,
    #[serde(default)]
    dimension: usize,
}

#[derive(Debug, Default, Deserialize)]
struct IndexDatabase {
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: i64,
}

impl PineconeStore {
    /// Build an adapter from configuration. Does not touch the network;
    /// call [`connect`](VectorStore::connect) to validate reachability.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.kind != StoreKind::Pinecone {
            return Err(MigrateError::Config(format!(
                "expected kind 'pinecone', got '{}'",
                config.kind
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let base_url = if config.url.is_empty() {
            PINECONE_API_BASE.to_string()
        } else {
            config.url.trim_end_matches('/').to_string()
        };

        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    fn record_from(vector: PineconeVector) -> Record {
        Record {
            id: vector.id,
            vector: vector.values,
            metadata: vector.metadata,
        }
    }

    fn vector_from(record: &Record) -> PineconeVector {
        PineconeVector {
            id: record.id.clone(),
            values: record.vector.clone(),
            metadata: record.metadata.clone(),
        }
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn connect(&self) -> Result<()> {
        self.validate_connection().await
    }

    async fn close(&self) {}

    async fn get_batch(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<Record>> {
        let limit_param = limit.to_string();
        let mut request = self
            .client
            .get(format!("{}/vectors/list", self.base_url))
            .header("Api-Key", &self.config.api_key)
            .query(&[
                ("index", self.config.index.as_str()),
                ("limit", limit_param.as_str()),
            ]);
        if let Some(after) = after_id {
            request = request.query(&[("pagination_token", after)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(response_error("pinecone", response).await);
        }

        let list: ListResponse = response.json().await?;
        Ok(list.vectors.into_iter().map(Self::record_from).collect())
    }

    async fn upsert_batch(&self, records: &[Record]) -> Result<()> {
        let payload = UpsertRequest {
            vectors: records.iter().map(Self::vector_from).collect(),
        };

        let response = self
            .client
            .post(format!("{}/vectors/upsert", self.base_url))
            .header("Api-Key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("pinecone", response).await);
        }
        Ok(())
    }

    async fn delete_batch(&self, ids: &[String]) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/vectors/delete", self.base_url))
            .header("Api-Key", &self.config.api_key)
            .json(&DeleteRequest { ids })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("pinecone", response).await);
        }
        Ok(())
    }

    async fn validate_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.base_url, self.config.index))
            .header("Api-Key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("pinecone", response).await);
        }
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.base_url, self.config.index))
            .header("Api-Key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error("pinecone", response).await);
        }

        let info: IndexInfo = response.json().await?;
        Ok(StoreStats {
            total_records: info.database.total_vector_count,
            dimensions: info.dimension,
            index_kind: "pinecone-serverless".to_string(),
            // Not reported by the API.
            memory_bytes: 0,
        })
    }

    fn source_url(&self) -> &str {
        &self.config.url
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Pinecone
    }
}
