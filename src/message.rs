//! Conversation messages and tool-call primitives.
//!
//! Messages are the primary data structure threaded through a workflow
//! execution. Each message carries a [`Role`], text content, an optional set
//! of tool-call requests (assistant turns only), and an optional binding to
//! the tool call it answers (tool turns only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of a message author within a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human input.
    User,
    /// Model output, either final text or tool-call requests.
    Assistant,
    /// Instructions and injected context.
    System,
    /// Result (or error/denial) of a tool invocation.
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured request from the model to invoke an external tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the request with its eventual result message.
    pub id: String,
    /// Name resolved against the tool registry.
    pub name: String,
    /// JSON arguments as produced by the model.
    pub arguments: Value,
}

impl ToolCall {
    /// Create a tool call with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call with an explicit id (useful for replaying histories).
    #[must_use]
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single conversation turn.
///
/// # Examples
///
/// ```
/// use convograph::message::{Message, Role};
///
/// let user = Message::user("What time is it?");
/// assert!(user.has_role(Role::User));
///
/// let reply = Message::assistant("It's noon.");
/// assert!(reply.is_final_assistant());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool-call requests attached to an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Id of the tool call this message answers (tool turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            created_at: Utc::now(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message with final text content.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create an assistant turn carrying tool-call requests.
    ///
    /// `content` may be empty; models frequently emit calls without prose.
    #[must_use]
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Create a tool-result message bound to the call it answers.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    /// Returns true if this assistant turn requests at least one tool call.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Returns true if this is an assistant turn with non-empty content and
    /// no pending tool-call requests, i.e. a well-formed terminal candidate.
    #[must_use]
    pub fn is_final_assistant(&self) -> bool {
        self.role == Role::Assistant && !self.content.is_empty() && self.tool_calls.is_empty()
    }
}
