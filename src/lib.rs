//! toolstream: streaming tool-use orchestration
//!
//! Drives a multi-round conversation with a reasoning backend whose output
//! arrives as a stream of typed segments (reasoning, text, tool invocations),
//! runs the operations the model asks for, feeds the results back, and turns
//! the final text into a fully typed [`Assessment`](types::Assessment).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use toolstream::prelude::*;
//!
//! # async fn example() -> toolstream::error::Result<()> {
//! let tools = ToolRegistry::new().register(Arc::new(AgentTool::new(
//!     "find_clinic",
//!     "Find the nearest clinic",
//!     ToolParameters::object().string("city", "City name", true).build(),
//!     |args, _ctx| async move {
//!         Ok(json!({"clinic": format!("{} General", args.get_str("city")?)}))
//!     },
//! )));
//! let catalog = Arc::new(tools.catalog());
//!
//! let orchestrator = Orchestrator::new(
//!     Arc::new(AnthropicProvider::from_env()?),
//!     Arc::new(tools),
//!     catalog,
//! )
//! .with_config(OrchestratorConfig::load()?);
//!
//! let outcome = orchestrator
//!     .run(OrchestrationRequest::new("I twisted my ankle"), CancellationToken::new())
//!     .await;
//! if let Some(result) = outcome.result() {
//!     println!("{}: {}", result.severity, result.go_to);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod util;
pub mod validate;
