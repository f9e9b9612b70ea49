//! SQLite-backed state tracker.
//!
//! Two tables: `migrations` holds lifecycle state keyed by migration id,
//! `checkpoints` holds one self-describing JSON blob per migration. All
//! writes go through SQLite's native `ON CONFLICT` upserts so concurrent
//! callers observe last-writer-wins on distinct ids and serialisable
//! behaviour per id.
//!
//! `:memory:` is a supported path for tests; the pool is then pinned to a
//! single connection because every SQLite in-memory connection is its own
//! database.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use super::{Checkpoint, MigrationStatus, StateTracker};
use crate::error::{MigrateError, Result};

/// Path value selecting the in-process database mode.
pub const MEMORY_PATH: &str = ":memory:";

/// SQLite implementation of [`StateTracker`].
pub struct SqliteTracker {
    pool: SqlitePool,
}

impl SqliteTracker {
    /// Open (creating if missing) the state database at `path`.
    pub async fn connect(path: &str) -> Result<Self> {
        let in_memory = path == MEMORY_PATH;

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        }
        .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            // One connection only: each in-memory connection is a separate DB.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            pool_options = pool_options.max_connections(5);
        }

        let pool = pool_options.connect_with(options).await?;

        let tracker = Self { pool };
        tracker.init_schema().await?;
        Ok(tracker)
    }

    /// Create tables and indexes. Idempotent.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS migrations (
                migration_id TEXT PRIMARY KEY,
                state TEXT NOT NULL DEFAULT 'not_started',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                migration_id TEXT PRIMARY KEY
                    REFERENCES migrations(migration_id) ON DELETE CASCADE,
                checkpoint_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_migrations_state ON migrations(state)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl StateTracker for SqliteTracker {
    async fn get_state(&self, migration_id: &str) -> Result<MigrationStatus> {
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM migrations WHERE migration_id = ?1")
                .bind(migration_id)
                .fetch_optional(&self.pool)
                .await?;

        match state {
            Some(s) => MigrationStatus::parse(&s),
            None => Ok(MigrationStatus::NotStarted),
        }
    }

    async fn set_state(&self, migration_id: &str, status: MigrationStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT state FROM migrations WHERE migration_id = ?1")
                .bind(migration_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(current) = current {
            let current = MigrationStatus::parse(&current)?;
            if current.is_terminal() && current != status {
                return Err(MigrateError::lifecycle(format!(
                    "migration {} is {} and accepts no further transitions",
                    migration_id, current
                )));
            }
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO migrations (migration_id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(migration_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at",
        )
        .bind(migration_id)
        .bind(status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_checkpoint(&self, migration_id: &str) -> Result<Option<Checkpoint>> {
        let blob: Option<String> =
            sqlx::query_scalar("SELECT checkpoint_data FROM checkpoints WHERE migration_id = ?1")
                .bind(migration_id)
                .fetch_optional(&self.pool)
                .await?;

        match blob {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        let blob = serde_json::to_string(checkpoint)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        // Ensure the migration row exists; promote not_started to in_progress
        // in the same transaction. Other states are left untouched.
        sqlx::query(
            "INSERT INTO migrations (migration_id, state, created_at, updated_at)
             VALUES (?1, 'in_progress', ?2, ?2)
             ON CONFLICT(migration_id) DO UPDATE SET
                state = CASE
                    WHEN migrations.state = 'not_started' THEN 'in_progress'
                    ELSE migrations.state
                END,
                updated_at = excluded.updated_at",
        )
        .bind(&checkpoint.migration_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO checkpoints (migration_id, checkpoint_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(migration_id) DO UPDATE SET
                checkpoint_data = excluded.checkpoint_data,
                updated_at = excluded.updated_at",
        )
        .bind(&checkpoint.migration_id)
        .bind(blob)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_checkpoint(&self, migration_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE migration_id = ?1")
            .bind(migration_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_migrations(
        &self,
        filter: Option<MigrationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<String>> {
        let ids: Vec<String> = match filter {
            Some(status) => {
                sqlx::query_scalar(
                    "SELECT migration_id FROM migrations
                     WHERE state = ?1
                     ORDER BY created_at DESC, migration_id DESC
                     LIMIT ?2 OFFSET ?3",
                )
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT migration_id FROM migrations
                     ORDER BY created_at DESC, migration_id DESC
                     LIMIT ?1 OFFSET ?2",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(ids)
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
