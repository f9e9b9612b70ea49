//! State tracker trait for migration state persistence.

use async_trait::async_trait;

use super::{Checkpoint, MigrationStatus};
use crate::error::Result;

/// Trait for migration lifecycle and checkpoint persistence.
///
/// Every call either succeeds atomically or fails with a typed error leaving
/// durable state unchanged. Implementations must be `Send + Sync` so they can
/// be shared between the control endpoint and migration workers.
///
/// # Example
///
/// ```rust,ignore
/// let tracker: Arc<dyn StateTracker> = Arc::new(SqliteTracker::connect(":memory:").await?);
/// let state = tracker.get_state("mig-123").await?;
/// assert_eq!(state, MigrationStatus::NotStarted);
/// ```
#[async_trait]
pub trait StateTracker: Send + Sync {
    /// Current lifecycle state; `NotStarted` for unknown ids, never an error.
    async fn get_state(&self, migration_id: &str) -> Result<MigrationStatus>;

    /// Upsert the lifecycle state and bump `updated_at`.
    ///
    /// Terminal states (`completed`, `rolled_back`) reject any transition to
    /// a different state.
    async fn set_state(&self, migration_id: &str, status: MigrationStatus) -> Result<()>;

    /// Latest checkpoint; `None` for unknown ids, never an error.
    async fn get_checkpoint(&self, migration_id: &str) -> Result<Option<Checkpoint>>;

    /// Upsert the checkpoint by migration id.
    ///
    /// If the migration is still `not_started` it is promoted to
    /// `in_progress` within the same transaction.
    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Remove a checkpoint. Idempotent; lifecycle state is untouched.
    async fn delete_checkpoint(&self, migration_id: &str) -> Result<()>;

    /// List migration ids, newest first, with optional status filter and
    /// offset pagination.
    async fn list_migrations(
        &self,
        filter: Option<MigrationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<String>>;

    /// Release underlying resources.
    async fn close(&self);

    /// Backend type name for logging.
    fn backend_type(&self) -> &'static str;
}
