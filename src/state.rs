//! Conversation state carried through a workflow execution.
//!
//! [`ConversationState`] is the single mutable record a workflow run operates
//! on. Nodes never mutate it directly; they return a [`NodeUpdate`] and the
//! engine applies it between steps, so every observable change flows through
//! [`ConversationState::apply`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, Role, ToolCall};
use crate::node::NodeUpdate;
use crate::utils::new_metadata_map;

/// Mutable record of one workflow execution over a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    /// Identity of the requesting user, used for permission checks.
    pub user_id: String,
    /// Identity of the conversation this execution belongs to.
    pub conversation_id: String,
    /// Formatted retrieval context, set by the retrieval stage.
    pub retrieval_context: Option<String>,
    /// Summary of trimmed history, set by the memory stage.
    pub memory_summary: Option<String>,
    /// Number of tool calls processed so far in this execution.
    pub tool_call_count: u32,
    /// Auxiliary values accumulated during execution (token usage, markers).
    pub metadata: FxHashMap<String, Value>,
    messages: Vec<Message>,
}

impl ConversationState {
    /// Metadata key accumulating prompt token usage across model calls.
    pub const PROMPT_TOKENS_KEY: &'static str = "prompt_tokens";
    /// Metadata key accumulating completion token usage across model calls.
    pub const COMPLETION_TOKENS_KEY: &'static str = "completion_tokens";
    /// Marker set when a primary model invocation failed and the run was
    /// rerouted to finalization.
    pub const MODEL_ERROR_KEY: &'static str = "model_error";

    /// Create state for a fresh conversation seeded with one user message.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        user_text: impl Into<String>,
    ) -> Self {
        Self::builder(user_id, conversation_id)
            .with_user_message(user_text)
            .build()
    }

    /// Start building state with an arbitrary message history.
    #[must_use]
    pub fn builder(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> ConversationStateBuilder {
        ConversationStateBuilder {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
        }
    }

    /// Full message history in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Most recent user message, if any.
    #[must_use]
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.has_role(Role::User))
    }

    /// Tool calls requested by the last message, if it is an assistant turn
    /// carrying calls. Routing and tool execution both read from here.
    #[must_use]
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self.last_message() {
            Some(m) if m.requests_tools() => &m.tool_calls,
            _ => &[],
        }
    }

    /// Most recent assistant message with non-empty content and no pending
    /// tool calls. This is the message a completed run reports as terminal.
    #[must_use]
    pub fn terminal_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_final_assistant())
    }

    /// Fold a node's update into the state.
    ///
    /// Replacement (memory trimming) is applied before appends so a node can
    /// both truncate history and add to the tail in one update.
    pub(crate) fn apply(&mut self, update: NodeUpdate) {
        if let Some(replacement) = update.replace_messages {
            self.messages = replacement;
        }
        self.messages.extend(update.messages);
        if let Some(context) = update.retrieval_context {
            self.retrieval_context = Some(context);
        }
        if let Some(summary) = update.memory_summary {
            self.memory_summary = Some(summary);
        }
        self.tool_call_count += update.tool_calls_delta;
        self.metadata.extend(update.metadata);
    }

    /// Record a primary model failure so finalization can distinguish a
    /// degraded run from an ordinary early exit.
    pub(crate) fn note_model_failure(&mut self, message: impl Into<String>) {
        self.metadata
            .insert(Self::MODEL_ERROR_KEY.into(), Value::String(message.into()));
    }
}

/// Fluent builder for [`ConversationState`] with a preloaded history.
#[derive(Debug)]
pub struct ConversationStateBuilder {
    user_id: String,
    conversation_id: String,
    messages: Vec<Message>,
}

impl ConversationStateBuilder {
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_user_message(self, content: impl Into<String>) -> Self {
        self.with_message(Message::user(content))
    }

    #[must_use]
    pub fn with_assistant_message(self, content: impl Into<String>) -> Self {
        self.with_message(Message::assistant(content))
    }

    #[must_use]
    pub fn with_system_message(self, content: impl Into<String>) -> Self {
        self.with_message(Message::system(content))
    }

    #[must_use]
    pub fn build(self) -> ConversationState {
        ConversationState {
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            retrieval_context: None,
            memory_summary: None,
            tool_call_count: 0,
            metadata: new_metadata_map(),
            messages: self.messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn simple_state() -> ConversationState {
        ConversationState::new("u1", "c1", "hello")
    }

    #[test]
    fn new_seeds_one_user_message() {
        let state = simple_state();
        assert_eq!(state.messages().len(), 1);
        assert!(state.messages()[0].has_role(Role::User));
        assert_eq!(state.tool_call_count, 0);
    }

    #[test]
    fn apply_appends_after_replacement() {
        let mut state = ConversationState::builder("u1", "c1")
            .with_user_message("one")
            .with_assistant_message("two")
            .with_user_message("three")
            .build();
        let update = NodeUpdate::default()
            .with_replaced_messages(vec![Message::user("three")])
            .with_message(Message::assistant("four"));
        state.apply(update);
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[0].content, "three");
        assert_eq!(state.messages()[1].content, "four");
    }

    #[test]
    fn apply_accumulates_tool_calls_and_metadata() {
        let mut state = simple_state();
        let mut update = NodeUpdate::default().with_tool_calls_delta(2);
        update.metadata.insert("k".into(), json!(1));
        state.apply(update);
        state.apply(NodeUpdate::default().with_tool_calls_delta(1));
        assert_eq!(state.tool_call_count, 3);
        assert_eq!(state.metadata.get("k"), Some(&json!(1)));
    }

    #[test]
    fn pending_tool_calls_only_from_last_message() {
        let call = ToolCall::new("lookup", json!({}));
        let mut state = simple_state();
        state.apply(
            NodeUpdate::default().with_message(Message::assistant_with_calls("", vec![call])),
        );
        assert_eq!(state.pending_tool_calls().len(), 1);
        state.apply(NodeUpdate::default().with_message(Message::tool_result("id", "ok")));
        assert!(state.pending_tool_calls().is_empty());
    }

    #[test]
    fn terminal_message_skips_tool_call_turns() {
        let mut state = simple_state();
        state.apply(NodeUpdate::default().with_message(Message::assistant("earlier answer")));
        state.apply(NodeUpdate::default().with_message(Message::assistant_with_calls(
            "",
            vec![ToolCall::new("t", json!({}))],
        )));
        assert_eq!(
            state.terminal_message().map(|m| m.content.as_str()),
            Some("earlier answer")
        );
    }
}
