//! Operations the model may request, and the executor that runs them.
//!
//! Every operation kind registered here must be independent of every other
//! operation in the same batch: the dispatcher runs a batch concurrently and
//! gives no ordering between its members.

pub mod arguments;
pub mod catalog;
pub mod executor;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use catalog::{CapabilityCatalog, ToolDefinition};
pub use executor::{OperationExecutor, ToolRegistry};
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::ToolParameters;
