//! # vector-migrate
//!
//! Checkpointed migration of vector database contents between stores, with a
//! JSON-RPC control plane.
//!
//! The library provides:
//!
//! - **Durable state tracking** in an embedded SQLite store, with resumable
//!   checkpoints per migration
//! - **A batch-oriented orchestrator** driving read, transform, write,
//!   checkpoint cycles with retry and cooperative pause/stop
//! - **Schema mapping** between store metadata layouts (renames, converters,
//!   defaults, flattening)
//! - **A control endpoint**: JSON-RPC over HTTP behind audit logging,
//!   constant-time API key authentication, and per-principal rate limiting
//! - **Store adapters** for Pinecone and Qdrant plus an in-memory store for
//!   tests and dry runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vector_migrate::{
//!     MigrationConfig, MigrationOptions, Orchestrator, SchemaMapping, SqliteTracker, StoreKind,
//! };
//! use vector_migrate::adapters::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tracker = Arc::new(SqliteTracker::connect("vector-migrate.db").await?);
//!     let orchestrator = Orchestrator::new("mig-1", tracker);
//!
//!     orchestrator
//!         .start(MigrationConfig {
//!             source: Arc::new(MemoryStore::new("source")),
//!             target: Arc::new(MemoryStore::new("target")),
//!             mapping: SchemaMapping::identity(StoreKind::Pinecone, StoreKind::Qdrant),
//!             options: MigrationOptions::default(),
//!         })
//!         .await?;
//!
//!     let stats = orchestrator.get_status("mig-1")?;
//!     println!("state: {}", stats.state);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod server;
pub mod state;

// Re-exports for convenient access
pub use config::{Config, MigrationOptions, ServerConfig, StoreConfig};
pub use core::{Record, StoreKind, StoreStats, VectorStore};
pub use error::{MigrateError, Result};
pub use mapper::{SchemaMapping, SchemaRecommendation};
pub use orchestrator::{
    MigrationConfig, MigrationStats, Orchestrator, RunState, ValidationReport,
};
pub use server::{ControlServer, ToolRegistry};
pub use state::{Checkpoint, MigrationStatus, SqliteTracker, StateTracker};
