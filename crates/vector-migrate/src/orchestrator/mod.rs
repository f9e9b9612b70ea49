//! Migration orchestrator - drives the read/transform/write/checkpoint loop.
//!
//! One [`Orchestrator`] instance is bound to one migration id. `start()`
//! dispatches the pipeline to a spawned worker and returns immediately; the
//! worker owns the migration until it reaches a terminal state. Counters and
//! coordination flags live behind a `std::sync::RwLock` that is never held
//! across an await point; pause and stop are observed cooperatively at the
//! top of every batch iteration.
//!
//! Checkpoints are committed *after* their covered batch is durably upserted
//! on the target, so a crash between upsert and checkpoint re-sends the last
//! batch on recovery. Upsert semantics make the re-send harmless.

pub mod retry;
pub mod validate;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{MigrationOptions, DEFAULT_BATCH_SIZE};
use crate::core::VectorStore;
use crate::error::{MigrateError, Result};
use crate::mapper::{self, SchemaMapping};
use crate::state::{Checkpoint, MigrationStatus, StateTracker};

pub use retry::with_retry;
pub use validate::{
    validate_and_record, validate_migration, ValidationIssue, ValidationReport,
};

/// Base delay for the linear retry backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Poll interval while paused.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Configuration for one migration run.
pub struct MigrationConfig {
    /// Source store (read side).
    pub source: Arc<dyn VectorStore>,

    /// Target store (write side).
    pub target: Arc<dyn VectorStore>,

    /// Metadata transformation applied to every record.
    pub mapping: SchemaMapping,

    /// Batch size, retry budget, checkpoint cadence.
    pub options: MigrationOptions,
}

/// Run-level state of a migration as seen by this orchestrator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
    RolledBack,
}

impl RunState {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Stopped | RunState::RolledBack
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Stopped => "stopped",
            RunState::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// Snapshot of migration progress.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStats {
    pub total_records: i64,
    pub migrated_records: i64,
    pub failed_records: i64,
    pub batches_processed: i64,
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationStats {
    fn idle() -> Self {
        Self {
            total_records: 0,
            migrated_records: 0,
            failed_records: 0,
            batches_processed: 0,
            state: RunState::Idle,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// Per-migration orchestrator.
pub struct Orchestrator {
    migration_id: String,
    tracker: Arc<dyn StateTracker>,
    shared: Arc<Shared>,
}

struct Shared {
    state: RwLock<Runner>,
}

struct Runner {
    running: bool,
    paused: bool,
    cancel: Option<CancellationToken>,
    stats: MigrationStats,
}

impl Shared {
    // Lock accessors recover from poisoning: a panicking worker must not
    // wedge status queries.
    fn read(&self) -> RwLockReadGuard<'_, Runner> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Runner> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Outcome of the batch loop, handled by a single terminal dispatcher.
enum Outcome {
    Completed,
    Stopped,
    Failed(String),
}

impl Orchestrator {
    /// Create an orchestrator for one migration id.
    pub fn new(migration_id: impl Into<String>, tracker: Arc<dyn StateTracker>) -> Self {
        Self {
            migration_id: migration_id.into(),
            tracker,
            shared: Arc::new(Shared {
                state: RwLock::new(Runner {
                    running: false,
                    paused: false,
                    cancel: None,
                    stats: MigrationStats::idle(),
                }),
            }),
        }
    }

    /// The migration id this instance is bound to.
    pub fn migration_id(&self) -> &str {
        &self.migration_id
    }

    /// Begin the migration. Fails if a run is already active for this
    /// instance or the migration has already reached a durable terminal
    /// state. Returns as soon as the worker is dispatched.
    pub async fn start(&self, config: MigrationConfig) -> Result<()> {
        config.mapping.validate()?;

        // Reserve the single active run before doing any I/O.
        {
            let mut st = self.shared.write();
            if st.running {
                return Err(MigrateError::lifecycle("migration already running"));
            }
            st.running = true;
            st.paused = false;
        }

        match self.prepare_run(&config).await {
            Ok(checkpoint) => {
                let cancel = CancellationToken::new();
                {
                    let mut st = self.shared.write();
                    st.cancel = Some(cancel.clone());
                    st.stats = MigrationStats {
                        total_records: checkpoint.total_records,
                        migrated_records: checkpoint.processed_count,
                        failed_records: checkpoint.failed_count,
                        batches_processed: 0,
                        state: RunState::Running,
                        started_at: Some(checkpoint.started_at),
                        ended_at: None,
                        error: None,
                    };
                }

                info!(
                    migration_id = %self.migration_id,
                    resume_cursor = checkpoint.cursor().unwrap_or(""),
                    "starting migration worker"
                );

                let shared = Arc::clone(&self.shared);
                let tracker = Arc::clone(&self.tracker);
                let migration_id = self.migration_id.clone();
                tokio::spawn(async move {
                    run_pipeline(shared, tracker, migration_id, config, cancel, checkpoint).await;
                });

                Ok(())
            }
            Err(e) => {
                let mut st = self.shared.write();
                st.running = false;
                Err(e)
            }
        }
    }

    /// Write (or refresh) the initial checkpoint. An existing checkpoint is
    /// carried forward so a restarted migration resumes from its cursor.
    async fn prepare_run(&self, config: &MigrationConfig) -> Result<Checkpoint> {
        let durable = self.tracker.get_state(&self.migration_id).await?;
        if durable.is_terminal() {
            return Err(MigrateError::lifecycle(format!(
                "migration {} is already {}",
                self.migration_id, durable
            )));
        }

        let mut checkpoint = match self.tracker.get_checkpoint(&self.migration_id).await? {
            Some(existing) => existing,
            None => Checkpoint::new(&self.migration_id),
        };
        checkpoint.last_checkpoint_at = Utc::now();
        checkpoint.schema_mapping = Some(serde_json::to_value(&config.mapping)?);

        self.tracker.save_checkpoint(&checkpoint).await?;
        Ok(checkpoint)
    }

    /// Pause an in-progress migration. The loop parks at the next batch
    /// boundary; no state is lost.
    pub fn pause(&self, migration_id: &str) -> Result<()> {
        self.check_id(migration_id)?;

        let mut st = self.shared.write();
        if !st.running {
            return Err(MigrateError::lifecycle("migration not running"));
        }
        st.paused = true;
        st.stats.state = RunState::Paused;
        Ok(())
    }

    /// Resume a paused migration.
    pub fn resume(&self, migration_id: &str) -> Result<()> {
        self.check_id(migration_id)?;

        let mut st = self.shared.write();
        if !st.paused {
            return Err(MigrateError::lifecycle("migration not paused"));
        }
        st.paused = false;
        st.stats.state = RunState::Running;
        Ok(())
    }

    /// Request a cooperative stop. The worker exits at the next pause point,
    /// persists a checkpoint, and leaves the durable state `in_progress` so
    /// the migration can be restarted later.
    pub fn stop(&self, migration_id: &str) -> Result<()> {
        self.check_id(migration_id)?;

        let st = self.shared.read();
        if !st.running {
            return Err(MigrateError::lifecycle("migration not running"));
        }
        if let Some(cancel) = &st.cancel {
            cancel.cancel();
        }
        Ok(())
    }

    /// Mark the migration rolled back. Does not un-write target records;
    /// valid for in-progress (not actively running here) and failed
    /// migrations.
    pub async fn rollback(&self, migration_id: &str) -> Result<()> {
        self.check_id(migration_id)?;

        if self.shared.read().running {
            return Err(MigrateError::lifecycle(
                "stop the migration before rolling back",
            ));
        }

        let durable = self.tracker.get_state(migration_id).await?;
        match durable {
            MigrationStatus::NotStarted => {
                return Err(MigrateError::lifecycle(format!(
                    "migration {} has not started; nothing to roll back",
                    migration_id
                )));
            }
            MigrationStatus::Completed | MigrationStatus::RolledBack => {
                return Err(MigrateError::lifecycle(format!(
                    "migration {} is already {}",
                    migration_id, durable
                )));
            }
            MigrationStatus::InProgress | MigrationStatus::Failed => {}
        }

        self.tracker
            .set_state(migration_id, MigrationStatus::RolledBack)
            .await?;

        let mut st = self.shared.write();
        st.stats.state = RunState::RolledBack;
        st.stats.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Snapshot of the current counters and state.
    pub fn get_status(&self, migration_id: &str) -> Result<MigrationStats> {
        self.check_id(migration_id)?;
        Ok(self.shared.read().stats.clone())
    }

    fn check_id(&self, migration_id: &str) -> Result<()> {
        if migration_id != self.migration_id {
            return Err(MigrateError::lifecycle("migration ID mismatch"));
        }
        Ok(())
    }
}

/// Worker entry point: drive the batch loop, then write the terminal state.
async fn run_pipeline(
    shared: Arc<Shared>,
    tracker: Arc<dyn StateTracker>,
    migration_id: String,
    config: MigrationConfig,
    cancel: CancellationToken,
    mut checkpoint: Checkpoint,
) {
    let mut cursor: Option<String> = checkpoint.cursor().map(str::to_string);

    let outcome = drive(
        &shared,
        &tracker,
        &config,
        &cancel,
        &mut checkpoint,
        &mut cursor,
    )
    .await;

    match outcome {
        Outcome::Completed => {
            let final_checkpoint = snapshot_checkpoint(&shared, &checkpoint, &cursor);
            if let Err(e) = tracker.save_checkpoint(&final_checkpoint).await {
                finish_failed(
                    &shared,
                    &tracker,
                    &migration_id,
                    format!("failed to save final checkpoint: {}", e),
                )
                .await;
                return;
            }
            if let Err(e) = tracker
                .set_state(&migration_id, MigrationStatus::Completed)
                .await
            {
                finish_failed(
                    &shared,
                    &tracker,
                    &migration_id,
                    format!("failed to mark migration completed: {}", e),
                )
                .await;
                return;
            }

            let mut st = shared.write();
            st.stats.state = RunState::Completed;
            st.stats.ended_at = Some(Utc::now());
            st.running = false;
            st.paused = false;
            st.cancel = None;
            info!(migration_id = %migration_id, migrated = st.stats.migrated_records, "migration completed");
        }
        Outcome::Stopped => {
            let parked = snapshot_checkpoint(&shared, &checkpoint, &cursor);
            if let Err(e) = tracker.save_checkpoint(&parked).await {
                warn!(migration_id = %migration_id, "failed to persist checkpoint on stop: {}", e);
            }

            let mut st = shared.write();
            st.stats.state = RunState::Stopped;
            st.stats.ended_at = Some(Utc::now());
            st.running = false;
            st.paused = false;
            st.cancel = None;
            info!(migration_id = %migration_id, "migration stopped");
        }
        Outcome::Failed(reason) => {
            finish_failed(&shared, &tracker, &migration_id, reason).await;
        }
    }
}

/// The batch loop. Returns the terminal outcome without touching durable
/// lifecycle state; the caller handles that.
async fn drive(
    shared: &Arc<Shared>,
    tracker: &Arc<dyn StateTracker>,
    config: &MigrationConfig,
    cancel: &CancellationToken,
    checkpoint: &mut Checkpoint,
    cursor: &mut Option<String>,
) -> Outcome {
    let batch_size = if config.options.batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        config.options.batch_size
    };
    let validate_every = if config.options.validate_every == 0 {
        10
    } else {
        config.options.validate_every
    };
    let max_retries = config.options.max_retries;

    // Latest known source size.
    let source_stats = match with_retry("get source stats", max_retries, RETRY_BASE_DELAY, || {
        config.source.get_stats()
    })
    .await
    {
        Ok(stats) => stats,
        Err(e) => return Outcome::Failed(format!("failed to get source stats: {}", e)),
    };

    {
        let mut st = shared.write();
        st.stats.total_records = source_stats.total_records;
    }
    checkpoint.total_records = source_stats.total_records;

    let mut batch_num: u64 = 0;
    loop {
        // Pause/stop coordination point.
        loop {
            if cancel.is_cancelled() {
                return Outcome::Stopped;
            }
            if !shared.read().paused {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return Outcome::Stopped,
                _ = tokio::time::sleep(PAUSE_POLL) => {}
            }
        }

        let after = cursor.clone();
        let records = match with_retry("get batch", max_retries, RETRY_BASE_DELAY, || {
            config.source.get_batch(after.as_deref(), batch_size)
        })
        .await
        {
            Ok(records) => records,
            Err(e) => return Outcome::Failed(format!("failed to get batch {}: {}", batch_num, e)),
        };

        if records.is_empty() {
            return Outcome::Completed;
        }

        let mapped = match mapper::map_batch(&records, &config.mapping) {
            Ok(mapped) => mapped,
            Err(e) => return Outcome::Failed(format!("failed to map batch {}: {}", batch_num, e)),
        };

        if let Err(e) = with_retry("upsert batch", max_retries, RETRY_BASE_DELAY, || {
            config.target.upsert_batch(&mapped)
        })
        .await
        {
            return Outcome::Failed(format!("failed to upsert batch {}: {}", batch_num, e));
        }

        // Advance counters and cursor. The lock is released before any I/O.
        {
            let mut st = shared.write();
            st.stats.batches_processed += 1;
            st.stats.migrated_records += records.len() as i64;
        }
        *cursor = records.last().map(|r| r.id.clone());
        batch_num += 1;

        if batch_num % validate_every == 0 {
            let durable = snapshot_checkpoint(shared, checkpoint, cursor);
            if let Err(e) = tracker.save_checkpoint(&durable).await {
                return Outcome::Failed(format!("failed to save checkpoint: {}", e));
            }
        }
    }
}

/// Build a durable checkpoint from the live counters.
fn snapshot_checkpoint(
    shared: &Arc<Shared>,
    template: &Checkpoint,
    cursor: &Option<String>,
) -> Checkpoint {
    let st = shared.read();
    Checkpoint {
        migration_id: template.migration_id.clone(),
        last_processed_id: cursor.clone().unwrap_or_default(),
        total_records: st.stats.total_records,
        processed_count: st.stats.migrated_records,
        failed_count: st.stats.failed_records,
        started_at: template.started_at,
        last_checkpoint_at: Utc::now(),
        schema_mapping: template.schema_mapping.clone(),
        validation_stats: template.validation_stats.clone(),
    }
}

/// Fatal path: always record the terminal lifecycle state before exiting so
/// a later status query returns the true outcome.
async fn finish_failed(
    shared: &Arc<Shared>,
    tracker: &Arc<dyn StateTracker>,
    migration_id: &str,
    reason: String,
) {
    error!(migration_id = %migration_id, "migration failed: {}", reason);

    if let Err(e) = tracker.set_state(migration_id, MigrationStatus::Failed).await {
        error!(migration_id = %migration_id, "failed to record failed state: {}", e);
    }

    let mut st = shared.write();
    st.stats.state = RunState::Failed;
    st.stats.error = Some(reason);
    st.stats.ended_at = Some(Utc::now());
    st.running = false;
    st.paused = false;
    st.cancel = None;
}
