//! Built-in workflow stages.
//!
//! Each stage implements [`Node`](crate::node::Node). Supporting stages
//! (memory, retrieval, routing, tool execution) never fail the run; only
//! the model-dependent stages surface errors, and even those are recovered
//! by rerouting to finalization.

pub mod conditional;
pub mod finalize;
pub mod memory;
pub mod model;
pub mod retrieval;
pub mod tool;

pub use conditional::{decide, ConditionalEvaluator, Route};
pub use finalize::FinalizeResponse;
pub use memory::MemoryManager;
pub use model::ModelInvoker;
pub use retrieval::RetrievalNode;
pub use tool::{RecursionGuard, ToolExecutor};
