//! # Convograph: Graph-driven Conversational Workflow Engine
//!
//! Convograph executes one conversational turn as a walk over a compiled
//! workflow graph: trim memory, retrieve context, invoke the model, run a
//! bounded tool-calling loop, and finalize with a guaranteed non-empty
//! answer.
//!
//! ## Core Concepts
//!
//! - **Messages**: role-typed conversation turns, including tool calls and
//!   tool results
//! - **ConversationState**: the mutable record one execution operates on
//! - **WorkflowGraph**: routing table compiled from an [`EngineConfig`],
//!   validated so every cycle is budget-bounded
//! - **ExecutionEngine**: walks the graph, applying node updates in order
//! - **Streaming**: the same walk surfaced as an incremental event stream
//!
//! ## Quick Start
//!
//! ### Working with Messages
//!
//! ```
//! use convograph::message::{Message, Role};
//!
//! let user_msg = Message::user("What's the weather like?");
//! let assistant_msg = Message::assistant("It's sunny and 24°C!");
//! let system_msg = Message::system("You are a helpful assistant.");
//!
//! assert!(user_msg.has_role(Role::User));
//! assert!(assistant_msg.is_final_assistant());
//! # let _ = system_msg;
//! ```
//!
//! ### Running a Workflow
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use convograph::clients::{
//!     AiTurn, AllowAllPermissions, InMemoryToolRegistry, ModelClient, ModelError, ModelRequest,
//! };
//! use convograph::engine::{EngineConfig, ExecutionEngine, Services};
//! use convograph::graphs::GraphBuilder;
//! use convograph::state::ConversationState;
//!
//! struct MyModel;
//!
//! #[async_trait]
//! impl ModelClient for MyModel {
//!     async fn invoke(&self, _request: ModelRequest) -> Result<AiTurn, ModelError> {
//!         Ok(AiTurn {
//!             content: Some("Hello!".to_string()),
//!             ..AiTurn::default()
//!         })
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default().with_retrieval_enabled(false);
//! let graph = GraphBuilder::new(&config).build()?;
//! let services = Services::new(
//!     Arc::new(MyModel),
//!     Arc::new(InMemoryToolRegistry::new()),
//!     Arc::new(AllowAllPermissions),
//! );
//! let engine = ExecutionEngine::new(config, services);
//!
//! let state = ConversationState::new("user-1", "conv-1", "Hi there");
//! let report = engine.execute(&graph, state).await?;
//! println!("{}", report.terminal_message().content);
//! # Ok(())
//! # }
//! ```
//!
//! ### Streaming
//!
//! [`ExecutionEngine::execute_streaming`] runs the identical walk on a
//! background task and hands back an [`engine::EventStream`]; the terminal
//! message arrives as the final `Done` event, and joining the returned
//! [`engine::InvocationHandle`] yields the same report as a synchronous run.

pub mod clients;
pub mod engine;
pub mod event_bus;
pub mod graphs;
pub mod message;
pub mod node;
pub mod nodes;
pub mod state;
pub mod telemetry;
pub mod utils;

pub use engine::{EngineConfig, EngineError, ExecutionEngine, ExecutionReport, Services};
pub use graphs::{GraphBuilder, GraphCache, NodeId, WorkflowGraph};
pub use message::{Message, Role, ToolCall};
pub use state::ConversationState;
