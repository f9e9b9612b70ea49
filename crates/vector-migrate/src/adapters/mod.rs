//! Vector store adapters.
//!
//! Each adapter implements the full [`VectorStore`](crate::core::VectorStore)
//! capability set. Remote adapters classify HTTP failures as transient
//! (timeouts, 429, 5xx) or permanent (auth, bad request) so the orchestrator
//! can decide whether to retry.

pub mod memory;
pub mod pinecone;
pub mod qdrant;

use reqwest::StatusCode;

use crate::config::StoreConfig;
use crate::core::{StoreKind, VectorStore};
use crate::error::{MigrateError, Result};

pub use memory::MemoryStore;
pub use pinecone::PineconeStore;
pub use qdrant::QdrantStore;

/// Build and connect an adapter for the configured store kind.
pub async fn connect_store(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    match config.kind {
        StoreKind::Pinecone => {
            let store = PineconeStore::new(config.clone())?;
            store.connect().await?;
            Ok(Box::new(store))
        }
        StoreKind::Qdrant => {
            let store = QdrantStore::new(config.clone())?;
            store.connect().await?;
            Ok(Box::new(store))
        }
        StoreKind::Weaviate | StoreKind::Milvus => Err(MigrateError::Config(format!(
            "no adapter built for {} stores yet",
            config.kind
        ))),
    }
}

/// Map a non-success response into a classified store error.
pub(crate) async fn response_error(store: &str, response: reqwest::Response) -> MigrateError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_status(store, status, &body)
}

/// 408/429/5xx are transient; every other failure status is permanent.
pub(crate) fn classify_status(store: &str, status: StatusCode, body: &str) -> MigrateError {
    let message = if body.is_empty() {
        format!("API error ({})", status.as_u16())
    } else {
        format!("API error ({}): {}", status.as_u16(), body)
    };

    let transient = status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error();

    if transient {
        MigrateError::store_transient(store, message)
    } else {
        MigrateError::store_permanent(store, message)
    }
}
