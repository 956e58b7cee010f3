//! Core node abstraction for workflow stages.
//!
//! Every stage of a workflow implements [`Node`]: it reads an immutable view
//! of the conversation state and returns a [`NodeUpdate`] describing the
//! changes it wants applied. The engine owns the state and folds updates in
//! between steps, so nodes stay side-effect free with respect to each other.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::event_bus::{Event, EventEmitter};
use crate::graphs::NodeId;
use crate::message::Message;
use crate::state::ConversationState;

/// Execution context threaded into each node invocation.
///
/// Carries identity for event attribution and the emitter used to publish
/// progress to subscribers.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// The node being executed.
    pub node: NodeId,
    /// Monotonic step counter within the execution.
    pub step: u64,
    /// Unique id of this execution, shared by all its events.
    pub execution_id: String,
    /// Whether model nodes should stream tokens as they arrive.
    pub stream_tokens: bool,
    emitter: EventEmitter,
}

impl NodeContext {
    #[must_use]
    pub fn new(
        node: NodeId,
        step: u64,
        execution_id: impl Into<String>,
        stream_tokens: bool,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            node,
            step,
            execution_id: execution_id.into(),
            stream_tokens,
            emitter,
        }
    }

    /// Emitter for publishing events from spawned tasks.
    #[must_use]
    pub fn emitter(&self) -> EventEmitter {
        self.emitter.clone()
    }

    /// Publish an event. Best effort: if all subscribers are gone the event
    /// is dropped and execution continues.
    pub fn emit(&self, event: Event) {
        self.emitter.emit(event);
    }
}

/// Changes a node wants applied to the conversation state.
///
/// `None`/empty fields mean "no change"; the engine only touches what the
/// update names. Replacement runs before appends, so a memory node can trim
/// history and append in one pass.
#[derive(Clone, Debug, Default)]
pub struct NodeUpdate {
    /// Messages appended to the history.
    pub messages: Vec<Message>,
    /// Full history replacement, applied before appends.
    pub replace_messages: Option<Vec<Message>>,
    /// New retrieval context.
    pub retrieval_context: Option<String>,
    /// New memory summary.
    pub memory_summary: Option<String>,
    /// Tool calls processed by this node.
    pub tool_calls_delta: u32,
    /// Metadata merged into the state.
    pub metadata: FxHashMap<String, Value>,
}

impl NodeUpdate {
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    #[must_use]
    pub fn with_replaced_messages(mut self, messages: Vec<Message>) -> Self {
        self.replace_messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_retrieval_context(mut self, context: impl Into<String>) -> Self {
        self.retrieval_context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_memory_summary(mut self, summary: impl Into<String>) -> Self {
        self.memory_summary = Some(summary.into());
        self
    }

    /// Add to the number of tool calls this update reports as processed.
    /// Accumulates across repeated invocations.
    #[must_use]
    pub fn with_tool_calls_delta(mut self, delta: u32) -> Self {
        self.tool_calls_delta += delta;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Errors surfaced by node execution.
///
/// Only model-dependent stages produce errors; supporting stages degrade
/// gracefully and always return an update.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    #[error("model invocation failed: {message}")]
    #[diagnostic(
        code(convograph::node::model),
        help("check provider connectivity and the configured model timeout")
    )]
    Model { message: String },

    #[error("missing required input: {what}")]
    #[diagnostic(code(convograph::node::missing_input))]
    MissingInput { what: &'static str },

    #[error("serialization error: {0}")]
    #[diagnostic(code(convograph::node::serde))]
    Serde(#[from] serde_json::Error),
}

/// A single executable workflow stage.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this stage against a snapshot of the conversation state.
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError>;
}
