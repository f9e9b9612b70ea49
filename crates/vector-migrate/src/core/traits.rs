//! The vector store capability trait (the migration engine's database port).
//!
//! Concrete adapters (Pinecone, Qdrant, the in-memory test store) implement
//! [`VectorStore`]; the orchestrator only ever sees `Arc<dyn VectorStore>`.
//!
//! # Pagination contract
//!
//! [`get_batch`](VectorStore::get_batch) must be deterministic: the same
//! `after_id` yields the same records in the same order. Iteration continues
//! by passing the last returned record's id as the next cursor; an empty
//! batch signals end-of-stream for that cursor.
//!
//! # Upsert contract
//!
//! [`upsert_batch`](VectorStore::upsert_batch) is insert-or-replace by id.
//! Checkpoints are committed *after* their covered batch is durably written,
//! so a crash between upsert and checkpoint re-sends the last batch on
//! recovery; upsert semantics make that re-send harmless.

use async_trait::async_trait;

use super::record::{Record, StoreStats};
use crate::error::Result;

/// Uniform capability set for reading from and writing to a vector store.
///
/// Adapters are constructed from a [`StoreConfig`](crate::config::StoreConfig)
/// and must be `Send + Sync` so migrations can run on spawned workers.
///
/// Errors carry a transient/permanent classification (see
/// [`MigrateError::is_transient`](crate::error::MigrateError::is_transient))
/// so the orchestrator can decide whether to retry.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Validate reachability. Idempotent; safe to call repeatedly.
    async fn connect(&self) -> Result<()>;

    /// Release underlying resources.
    async fn close(&self);

    /// Fetch records strictly after the given cursor, in the store's natural
    /// order, up to `limit`. `None` starts from the beginning; an empty
    /// result means the cursor has reached end-of-stream.
    async fn get_batch(&self, after_id: Option<&str>, limit: usize) -> Result<Vec<Record>>;

    /// Insert-or-replace records by id.
    async fn upsert_batch(&self, records: &[Record]) -> Result<()>;

    /// Delete records by id.
    async fn delete_batch(&self, ids: &[String]) -> Result<()>;

    /// Check that the store is accessible with the configured credentials.
    async fn validate_connection(&self) -> Result<()>;

    /// Fetch store statistics (record count, dimensions, index kind).
    async fn get_stats(&self) -> Result<StoreStats>;

    /// Opaque endpoint identifier. May contain sensitive host details;
    /// log only after redaction.
    fn source_url(&self) -> &str;

    /// Store kind identifier for logging and mapping decisions.
    fn kind(&self) -> super::record::StoreKind;
}
