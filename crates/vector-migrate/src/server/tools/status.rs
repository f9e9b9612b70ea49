//! The `migration_status` tool.

use std::sync::Arc;

use chrono::SecondsFormat;
use futures::FutureExt;
use serde_json::{json, Map, Value};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{MigrateError, Result};
use crate::server::{Tool, ToolRegistry};
use crate::state::StateTracker;

/// Fetch lifecycle state and progress for one migration.
pub struct MigrationStatusTool {
    tracker: Arc<dyn StateTracker>,
}

impl MigrationStatusTool {
    pub fn new(tracker: Arc<dyn StateTracker>) -> Self {
        Self { tracker }
    }

    /// Add the tool to a registry.
    pub fn register(self, registry: &ToolRegistry) -> Result<()> {
        let tracker = self.tracker;
        registry.register(Tool {
            name: "migration_status".to_string(),
            description: "Get the current status and progress of a migration".to_string(),
            input_schema: input_schema(),
            handler: Arc::new(move |_ctx, params| {
                let tracker = Arc::clone(&tracker);
                async move { execute(tracker, params).await }.boxed()
            }),
        })
    }
}

fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "migration_id": {
                "type": "string",
                "description": "The unique identifier of the migration",
                "examples": ["mig-123", "migration-abc"]
            }
        },
        "required": ["migration_id"]
    })
}

async fn execute(tracker: Arc<dyn StateTracker>, params: Map<String, Value>) -> Result<Value> {
    let migration_id = params
        .get("migration_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            MigrateError::validation("migration_id is required and must be a non-empty string")
        })?;

    let checkpoint = tracker.get_checkpoint(migration_id).await?;
    let status = tracker.get_state(migration_id).await?;

    let mut response = json!({
        "migration_id": migration_id,
        "status": status.as_str(),
        "batches_processed": 0,
        "started_at": Value::Null,
        "ended_at": Value::Null,
    });

    match checkpoint {
        Some(cp) => {
            response["progress"] = json!({
                "total_records": cp.total_records,
                "migrated_records": cp.processed_count,
                "percentage": percentage(cp.processed_count, cp.total_records),
            });
            response["batches_processed"] =
                json!(cp.processed_count / DEFAULT_BATCH_SIZE as i64);
            response["started_at"] =
                json!(cp.started_at.to_rfc3339_opts(SecondsFormat::Secs, true));
            response["ended_at"] = json!(cp
                .last_checkpoint_at
                .to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        None => {
            response["progress"] = json!({
                "total_records": 0,
                "migrated_records": 0,
                "percentage": 0.0,
            });
        }
    }

    Ok(response)
}

/// `(part / total) * 100` when total is positive, else 0.
fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
