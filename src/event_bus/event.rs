//! Event types published during workflow execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graphs::NodeId;
use crate::message::Message;

/// Any observable occurrence during a workflow execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A node started or completed.
    Node(NodeLifecycleEvent),
    /// A streamed model token.
    Token(TokenEvent),
    /// A tool invocation outcome.
    Tool(ToolEvent),
    /// The execution completed with a terminal message.
    Done(DoneEvent),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeLifecycleEvent {
    pub node: NodeId,
    pub step: u64,
    pub execution_id: String,
    pub completed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenEvent {
    pub execution_id: String,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolEvent {
    pub execution_id: String,
    pub tool_name: String,
    pub call_id: String,
    /// "ok", "error", "timeout", "denied", "unknown", "repeat", or
    /// "budget_exhausted".
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoneEvent {
    pub execution_id: String,
    pub terminal: Message,
}

impl Event {
    #[must_use]
    pub fn node_started(node: NodeId, step: u64, execution_id: impl Into<String>) -> Self {
        Event::Node(NodeLifecycleEvent {
            node,
            step,
            execution_id: execution_id.into(),
            completed: false,
        })
    }

    #[must_use]
    pub fn node_completed(node: NodeId, step: u64, execution_id: impl Into<String>) -> Self {
        Event::Node(NodeLifecycleEvent {
            node,
            step,
            execution_id: execution_id.into(),
            completed: true,
        })
    }

    #[must_use]
    pub fn token(execution_id: impl Into<String>, text: impl Into<String>) -> Self {
        Event::Token(TokenEvent {
            execution_id: execution_id.into(),
            text: text.into(),
        })
    }

    #[must_use]
    pub fn tool_outcome(
        execution_id: impl Into<String>,
        tool_name: impl Into<String>,
        call_id: impl Into<String>,
        outcome: impl Into<String>,
        result: Option<Value>,
    ) -> Self {
        Event::Tool(ToolEvent {
            execution_id: execution_id.into(),
            tool_name: tool_name.into(),
            call_id: call_id.into(),
            outcome: outcome.into(),
            result,
        })
    }

    #[must_use]
    pub fn done(execution_id: impl Into<String>, terminal: Message) -> Self {
        Event::Done(DoneEvent {
            execution_id: execution_id.into(),
            terminal,
        })
    }

    /// Returns the streamed token text if this is a token event.
    #[must_use]
    pub fn token_text(&self) -> Option<&str> {
        match self {
            Event::Token(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Returns true if this event terminates a stream.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Event::Done(_))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Node(e) => {
                let phase = if e.completed { "completed" } else { "started" };
                write!(f, "[{}] step {} {}", e.node, e.step, phase)
            }
            Event::Token(e) => write!(f, "[token] {}", e.text),
            Event::Tool(e) => write!(f, "[tool:{}] {} ({})", e.tool_name, e.outcome, e.call_id),
            Event::Done(e) => write!(f, "[done] {}", e.terminal.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_text_extraction() {
        let event = Event::token("x1", "hel");
        assert_eq!(event.token_text(), Some("hel"));
        assert!(Event::done("x1", Message::assistant("hi")).token_text().is_none());
    }

    #[test]
    fn done_is_terminal() {
        assert!(Event::done("x1", Message::assistant("bye")).is_done());
        assert!(!Event::node_started(NodeId::Model, 1, "x1").is_done());
    }

    #[test]
    fn display_names_node_and_phase() {
        let started = Event::node_started(NodeId::Retrieval, 2, "x1");
        assert_eq!(started.to_string(), "[retrieval] step 2 started");
    }
}
