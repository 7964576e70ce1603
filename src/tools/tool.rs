//! Operations backed by `Tool` objects.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use uuid::Uuid;

use super::arguments::ToolArguments;
use super::catalog::ToolDefinition;
use super::types::ToolParameters;
use crate::error::ToolstreamError;

/// Where a single operation runs.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Id of the request being served.
    pub operation_id: String,
    pub invocation_id: Option<Uuid>,
    /// Time the dispatcher allows before recording a timeout.
    pub budget: Duration,
}

/// An operation the model may request by name.
///
/// The definition is what the catalog advertises. `execute` runs once per
/// request and must not retry.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> Result<Value, ToolstreamError>;
}

type HandlerFuture = BoxFuture<'static, Result<Value, ToolstreamError>>;
type Handler = Box<dyn Fn(ToolArguments, ToolExecutionContext) -> HandlerFuture + Send + Sync>;

/// A tool whose body is an async closure.
pub struct AgentTool {
    definition: ToolDefinition,
    handler: Handler,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolstreamError>> + Send + 'static,
    {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                parameters: parameters.schema,
            },
            handler: Box::new(move |args, ctx| handler(args, ctx).boxed()),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> Result<Value, ToolstreamError> {
        (self.handler)(args, ctx).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}
