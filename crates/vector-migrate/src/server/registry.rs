//! Name-indexed registry of callable tools.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{MigrateError, Result};

/// Request-scoped context handed to tool handlers.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Authenticated principal, when the pipeline attached one.
    pub principal: Option<String>,
}

/// Boxed async tool handler.
pub type ToolHandler =
    Arc<dyn Fn(ToolContext, Map<String, Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A callable tool: unique name, human description, declared input shape,
/// and the handler.
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

/// Tool metadata exposed by `list()`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Thread-safe registry: read-heavy lookups, rare registration writes.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Rejects empty and duplicate names.
    pub fn register(&self, tool: Tool) -> Result<()> {
        if tool.name.is_empty() {
            return Err(MigrateError::validation("tool name is required"));
        }

        let mut tools = self.write();
        if tools.contains_key(&tool.name) {
            return Err(MigrateError::validation(format!(
                "tool {} already registered",
                tool.name
            )));
        }

        tools.insert(tool.name.clone(), Arc::new(tool));
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<Tool>> {
        self.read().get(name).cloned()
    }

    /// All registered tools, sorted by name.
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .read()
            .values()
            .map(|tool| ToolInfo {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Execute a tool by name.
    pub async fn execute(
        &self,
        ctx: ToolContext,
        name: &str,
        params: Map<String, Value>,
    ) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| MigrateError::validation(format!("tool {} not found", name)))?;
        (tool.handler)(ctx, params).await
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Tool>>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Tool>>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }
}
