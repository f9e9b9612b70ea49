//! Configuration type definitions.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::StoreKind;

/// Root configuration for a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source vector store.
    pub source: StoreConfig,

    /// Target vector store.
    pub target: StoreConfig,

    /// Migration behavior options.
    #[serde(default)]
    pub migration: MigrationOptions,
}

/// Connection configuration for one vector store.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store kind (pinecone, qdrant, weaviate, milvus).
    pub kind: StoreKind,

    /// Endpoint URL. May be empty for stores with a fixed API base.
    #[serde(default)]
    pub url: String,

    /// API key / credential.
    #[serde(default)]
    pub api_key: String,

    /// Index or collection name.
    pub index: String,

    /// Request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Provider-specific settings.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("index", &self.index)
            .field("timeout_secs", &self.timeout_secs)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Migration behavior options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Records per batch (default: 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retry attempts for transient adapter errors (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Persist a checkpoint every N batches (default: 10).
    #[serde(default = "default_validate_every")]
    pub validate_every: u64,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            validate_every: default_validate_every(),
        }
    }
}

/// Control endpoint configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 127.0.0.1:8080).
    #[serde(default = "default_addr")]
    pub addr: String,

    /// API key required on every control request.
    pub api_key: String,

    /// Rate limit: requests per minute per principal (default: 100).
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Rate limit: burst capacity (default: 20).
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Path to the SQLite state store. `:memory:` for tests.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("addr", &self.addr)
            .field("api_key", &"[REDACTED]")
            .field("requests_per_minute", &self.requests_per_minute)
            .field("burst", &self.burst)
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Default batch size used by the pipeline and the status tool's
/// batch-count derivation.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// Default value functions for serde

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_validate_every() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_requests_per_minute() -> u32 {
    100
}

fn default_burst() -> u32 {
    20
}

fn default_db_path() -> String {
    "vector-migrate.db".to_string()
}
