//! The `list_migrations` tool.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{MigrateError, Result};
use crate::server::{Tool, ToolRegistry};
use crate::state::{MigrationStatus, StateTracker};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

/// Paginated migration listing with optional status filter and sorting.
pub struct ListMigrationsTool {
    tracker: Arc<dyn StateTracker>,
}

#[derive(Debug, Serialize)]
struct MigrationSummary {
    migration_id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<ProgressSummary>,
}

#[derive(Debug, Serialize)]
struct ProgressSummary {
    total: i64,
    current: i64,
    percent: f64,
}

impl ListMigrationsTool {
    pub fn new(tracker: Arc<dyn StateTracker>) -> Self {
        Self { tracker }
    }

    /// Add the tool to a registry.
    pub fn register(self, registry: &ToolRegistry) -> Result<()> {
        let tracker = self.tracker;
        registry.register(Tool {
            name: "list_migrations".to_string(),
            description: "List all migrations with optional filtering by status".to_string(),
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
            "status": {
                "type": "string",
                "description": "Filter by migration status",
                "enum": ["not_started", "in_progress", "completed", "failed", "rolled_back"]
            },
            "limit": {
                "type": "integer",
                "description": "Maximum number of migrations to return",
                "default": DEFAULT_LIMIT,
                "minimum": 1,
                "maximum": MAX_LIMIT
            },
            "offset": {
                "type": "integer",
                "description": "Number of migrations to skip (for pagination)",
                "default": 0,
                "minimum": 0
            },
            "sort_by": {
                "type": "string",
                "enum": ["created_at", "status", "migration_id"],
                "default": "created_at"
            },
            "sort_order": {
                "type": "string",
                "enum": ["asc", "desc"],
                "default": "desc"
            }
        }
    })
}

/// Accept both integer and float JSON numbers.
fn integer_param(params: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| MigrateError::validation(format!("{} must be an integer", key))),
    }
}

async fn execute(tracker: Arc<dyn StateTracker>, params: Map<String, Value>) -> Result<Value> {
    let filter = match params.get("status").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Some(
            MigrationStatus::parse(s)
                .map_err(|_| MigrateError::validation(format!("invalid status filter: {}", s)))?,
        ),
        _ => None,
    };

    let limit = integer_param(&params, "limit")?.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(MigrateError::validation(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let offset = integer_param(&params, "offset")?.unwrap_or(0);
    if offset < 0 {
        return Err(MigrateError::validation("offset must be non-negative"));
    }

    let sort_by = params
        .get("sort_by")
        .and_then(Value::as_str)
        .unwrap_or("created_at");
    if !["created_at", "status", "migration_id"].contains(&sort_by) {
        return Err(MigrateError::validation(format!(
            "invalid sort_by: {}",
            sort_by
        )));
    }

    let sort_order = params
        .get("sort_order")
        .and_then(Value::as_str)
        .unwrap_or("desc");
    if !["asc", "desc"].contains(&sort_order) {
        return Err(MigrateError::validation(format!(
            "invalid sort_order: {}",
            sort_order
        )));
    }

    let ids = tracker
        .list_migrations(filter, limit + offset, 0)
        .await?;
    let total = ids.len();

    let mut migrations = Vec::with_capacity(ids.len());
    for id in ids {
        let checkpoint = match tracker.get_checkpoint(&id).await {
            Ok(cp) => cp,
            Err(_) => continue,
        };
        let status = tracker
            .get_state(&id)
            .await
            .unwrap_or(MigrationStatus::NotStarted);

        let mut summary = MigrationSummary {
            migration_id: id,
            status: status.as_str().to_string(),
            created_at: None,
            progress: None,
        };

        if let Some(cp) = checkpoint {
            summary.created_at = Some(cp.started_at.to_rfc3339());
            if cp.total_records > 0 {
                summary.progress = Some(ProgressSummary {
                    total: cp.total_records,
                    current: cp.processed_count,
                    percent: cp.processed_count as f64 / cp.total_records as f64 * 100.0,
                });
            }
        }

        migrations.push(summary);
    }

    migrations.sort_by(|a, b| {
        let ordering = match sort_by {
            "migration_id" => a.migration_id.cmp(&b.migration_id),
            "status" => a.status.cmp(&b.status),
            _ => a.created_at.cmp(&b.created_at),
        };
        if sort_order == "desc" {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let start = (offset as usize).min(migrations.len());
    let end = (start + limit as usize).min(migrations.len());
    let page = &migrations[start..end];

    Ok(json!({
        "migrations": page,
        "total": total,
        "limit": limit,
        "offset": offset,
    }))
}
