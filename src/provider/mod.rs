//! Backend stream transports.
//!
//! A transport opens one round stream per call. It owns no orchestration
//! state: the full history, system prompt and catalog arrive with every
//! request.

#[cfg(feature = "anthropic")]
pub mod anthropic;
pub mod http;
pub mod scripted;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ToolstreamError;
use crate::tools::CapabilityCatalog;
use crate::types::{GenerationSettings, SignalStream, Turn};

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;
pub use scripted::{ScriptedProvider, ScriptedRound};

/// Everything a transport needs to open one round.
#[derive(Debug, Clone)]
pub struct RoundRequest {
    pub system: Option<String>,
    pub turns: Vec<Turn>,
    pub catalog: Arc<CapabilityCatalog>,
    pub settings: GenerationSettings,
}

/// Opens streamed rounds against a reasoning backend.
#[async_trait]
pub trait RoundStreamProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Open a stream for one round. An `Err` here means the round never
    /// started; failures after that arrive as `Err` items on the stream.
    async fn open_round_stream(
        &self,
        request: &RoundRequest,
    ) -> Result<SignalStream, ToolstreamError>;
}
