//! Built-in control-endpoint tools.

pub mod list;
pub mod schema;
pub mod status;

use std::sync::Arc;

use crate::error::Result;
use crate::state::StateTracker;

use super::ToolRegistry;

pub use list::ListMigrationsTool;
pub use schema::SchemaRecommendationTool;
pub use status::MigrationStatusTool;

/// Register the built-in tool set on a registry.
pub fn register_builtin_tools(
    registry: &ToolRegistry,
    tracker: Arc<dyn StateTracker>,
) -> Result<()> {
    MigrationStatusTool::new(Arc::clone(&tracker)).register(registry)?;
    ListMigrationsTool::new(tracker).register(registry)?;
    SchemaRecommendationTool::new().register(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SqliteTracker;

    #[tokio::test]
    async fn test_all_builtin_tools_register() {
        let tracker: Arc<dyn StateTracker> =
            Arc::new(SqliteTracker::connect(":memory:").await.unwrap());
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry, tracker).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["list_migrations", "migration_status", "schema_recommendation"]
        );
    }
}
