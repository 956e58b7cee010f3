//! Workflow execution.
//!
//! [`ExecutionEngine`] walks a compiled [`WorkflowGraph`](crate::graphs::WorkflowGraph)
//! against a [`ConversationState`](crate::state::ConversationState), invoking
//! node executors in order until finalization. Streaming executions run the
//! same walk on a background task and surface events incrementally.

mod config;
mod executor;
mod records;
mod streaming;

pub use config::EngineConfig;
pub use executor::{EngineError, ExecutionEngine, Services};
pub use records::{ExecutionReport, NodeExecutionRecord, StepStatus};
pub use streaming::{EventStream, InvocationHandle};
