//! Language-model provider boundary.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{Message, ToolCall};

/// Description of a callable tool, advertised to the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments.
    pub parameters: Value,
}

/// One request to the model provider.
#[derive(Clone, Debug, Default)]
pub struct ModelRequest {
    /// Conversation history to condition on.
    pub messages: Vec<Message>,
    /// Extra system-level context (memory summary, retrieved passages,
    /// finalization instructions) prepended by the caller's stage.
    pub system_context: Option<String>,
    /// Tools the model may request. Empty means tool calling is off for
    /// this request.
    pub tool_schemas: Vec<ToolSchema>,
}

/// Token accounting reported by a provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// One completed model turn.
///
/// A turn may carry text, tool-call requests, both, or (from a misbehaving
/// provider) neither.
#[derive(Clone, Debug, Default)]
pub struct AiTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

impl AiTurn {
    /// Returns true if the turn carries neither text nor tool calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().is_none_or(str::is_empty) && self.tool_calls.is_empty()
    }
}

/// Errors from a model provider.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("provider error: {0}")]
    #[diagnostic(code(convograph::model::provider))]
    Provider(String),

    #[error("model call exceeded its deadline")]
    #[diagnostic(code(convograph::model::timeout))]
    Timeout,
}

/// A language-model provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one completion against the provider.
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError>;

    /// Run one completion, pushing text chunks into `chunks` as they arrive.
    ///
    /// The returned turn must carry the full assembled content. The default
    /// implementation delegates to [`ModelClient::invoke`] and emits the
    /// whole content as a single chunk, so providers without native
    /// streaming still work under a streaming execution.
    async fn invoke_streaming(
        &self,
        request: ModelRequest,
        chunks: flume::Sender<String>,
    ) -> Result<AiTurn, ModelError> {
        let turn = self.invoke(request).await?;
        if let Some(content) = &turn.content {
            if !content.is_empty() {
                let _ = chunks.send(content.clone());
            }
        }
        Ok(turn)
    }
}
