//! Tool invocation boundary and the in-memory registry.

use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use super::model::ToolSchema;

/// Errors from a tool invocation.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    #[diagnostic(code(convograph::tool::arguments))]
    Arguments(String),

    #[error("tool execution failed: {0}")]
    #[diagnostic(code(convograph::tool::execution))]
    Execution(String),
}

/// A callable external tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry name, matched against model tool-call requests.
    fn name(&self) -> &str;

    /// Schema advertised to the model.
    fn schema(&self) -> ToolSchema;

    /// Run the tool with JSON arguments.
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Lookup surface the tool-execution stage resolves calls against.
pub trait ToolRegistry: Send + Sync {
    /// Resolve a tool by name. `None` means the model asked for a tool that
    /// does not exist here.
    fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>>;

    /// Schemas of all registered tools, for advertising to the model.
    fn schemas(&self) -> Vec<ToolSchema>;
}

/// Registry backed by a hash map, built once at startup.
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: FxHashMap<String, Arc<dyn Tool>>,
}

impl InMemoryToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name, replacing any previous entry.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry for InMemoryToolRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        // Stable ordering keeps prompts reproducible across runs.
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }
}
