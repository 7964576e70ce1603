//! The side-effect executor contract and its tool-backed implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::catalog::CapabilityCatalog;
use super::tool::{Tool, ToolExecutionContext};
use crate::error::ToolstreamError;

/// Resolves a named operation to a result.
///
/// Implementations are called concurrently for the members of one batch and
/// must not retry on their own; retries happen at the round level.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ToolstreamError>;
}

/// Executor backed by a set of [`Tool`] objects.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn with_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        tools.into_iter().fold(Self::new(), Self::register)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The catalog describing every registered tool.
    pub fn catalog(&self) -> CapabilityCatalog {
        CapabilityCatalog::new(self.tools.values().map(|tool| tool.definition().clone()))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[async_trait]
impl OperationExecutor for ToolRegistry {
    async fn execute(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, ToolstreamError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolstreamError::ToolExecution {
            tool_name: name.to_string(),
            message: format!("Tool '{name}' not found"),
        })?;
        tool.execute(args.clone(), ctx.clone()).await
    }
}
