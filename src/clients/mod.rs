//! External service boundaries.
//!
//! The engine depends only on the traits defined here. Production code plugs
//! in real providers; tests substitute deterministic fakes.

pub mod model;
pub mod permissions;
pub mod retrieval;
pub mod tools;

pub use model::{AiTurn, ModelClient, ModelError, ModelRequest, TokenUsage, ToolSchema};
pub use permissions::{AllowAllPermissions, PermissionChecker};
pub use retrieval::{Passage, RetrievalError, Retriever};
pub use tools::{InMemoryToolRegistry, Tool, ToolError, ToolRegistry};
