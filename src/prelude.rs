//! Convenience re-exports for common use.

pub use crate::config::{AnthropicConfig, OrchestratorConfig};
pub use crate::error::{Result, ToolstreamError};
pub use crate::orchestrator::{
    CompletedRun, EventSink, OrchestrationHandle, OrchestrationOutcome, OrchestrationRequest,
    Orchestrator, OrchestratorEvent, OrchestratorEventPayload,
};
#[cfg(feature = "anthropic")]
pub use crate::provider::AnthropicProvider;
pub use crate::provider::{RoundStreamProvider, ScriptedProvider, ScriptedRound};
pub use crate::session::{InMemorySessionStore, SessionStore};
pub use crate::telemetry::TelemetryAggregator;
pub use crate::tools::{
    AgentTool, CapabilityCatalog, OperationExecutor, Tool, ToolArguments, ToolParameters,
    ToolRegistry,
};
pub use crate::types::{
    Assessment, GenerationSettings, OperationRequest, OperationResult, Severity, Turn,
};
pub use crate::util::retry::RetryPolicy;
