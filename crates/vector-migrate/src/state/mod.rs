//! Durable migration state and checkpoints.
//!
//! The state module is the single source of truth for migration progress.
//! Lifecycle state and checkpoint blobs are persisted through the
//! [`StateTracker`] trait; the SQLite implementation lives in [`db`].
//!
//! # Design Pattern
//!
//! Storage is decoupled from the orchestrator via the Strategy pattern: the
//! orchestrator and the control-endpoint tools work with
//! `Arc<dyn StateTracker>` without knowing the concrete backend.

pub mod backend;
pub mod db;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MigrateError, Result};

pub use backend::StateTracker;
pub use db::SqliteTracker;

/// Durable lifecycle state of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    RolledBack,
}

impl MigrationStatus {
    /// String representation stored in the database and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::NotStarted => "not_started",
            MigrationStatus::InProgress => "in_progress",
            MigrationStatus::Completed => "completed",
            MigrationStatus::Failed => "failed",
            MigrationStatus::RolledBack => "rolled_back",
        }
    }

    /// Parse from the stored string representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "not_started" => Ok(MigrationStatus::NotStarted),
            "in_progress" => Ok(MigrationStatus::InProgress),
            "completed" => Ok(MigrationStatus::Completed),
            "failed" => Ok(MigrationStatus::Failed),
            "rolled_back" => Ok(MigrationStatus::RolledBack),
            other => Err(MigrateError::State(sqlx::Error::Decode(
                format!("invalid migration status: {}", other).into(),
            ))),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationStatus::Completed | MigrationStatus::RolledBack
        )
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of progress sufficient to resume a migration on restart.
///
/// Serialized as a single self-describing JSON blob keyed by migration id.
/// The `last_processed_id` in any saved checkpoint refers to a record that
/// has been successfully written to the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Migration this checkpoint belongs to.
    pub migration_id: String,

    /// Source cursor: id of the last record durably written to the target.
    /// Empty until the first checkpointed batch.
    #[serde(default)]
    pub last_processed_id: String,

    /// Latest known source size.
    #[serde(default)]
    pub total_records: i64,

    /// Records processed so far. Non-decreasing within a run.
    #[serde(default)]
    pub processed_count: i64,

    /// Records that failed per-record writes, when the adapter reports them.
    #[serde(default)]
    pub failed_count: i64,

    /// When the migration run started.
    pub started_at: DateTime<Utc>,

    /// When this checkpoint was taken.
    pub last_checkpoint_at: DateTime<Utc>,

    /// Opaque schema mapping in effect for this migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_mapping: Option<Value>,

    /// Validation sampling results, when validation has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_stats: Option<ValidationStats>,
}

impl Checkpoint {
    /// Create a fresh checkpoint for a migration starting now.
    pub fn new(migration_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            migration_id: migration_id.into(),
            last_processed_id: String::new(),
            total_records: 0,
            processed_count: 0,
            failed_count: 0,
            started_at: now,
            last_checkpoint_at: now,
            schema_mapping: None,
            validation_stats: None,
        }
    }

    /// Cursor to resume from, `None` when no batch has been checkpointed.
    pub fn cursor(&self) -> Option<&str> {
        if self.last_processed_id.is_empty() {
            None
        } else {
            Some(&self.last_processed_id)
        }
    }
}

/// Cosine-similarity statistics from validation sampling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    pub sampled_count: i64,
    pub avg_cosine_similarity: f64,
    pub min_cosine_similarity: f64,
    pub max_cosine_similarity: f64,
}
