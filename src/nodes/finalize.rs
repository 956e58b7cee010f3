//! Terminal stage guaranteeing a well-formed response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::{ModelClient, ModelRequest};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodeUpdate};
use crate::state::ConversationState;

/// Deterministic reply used when even the finalization retry cannot produce
/// content.
pub const FALLBACK_REPLY: &str =
    "I ran into trouble completing that request. Please try again.";

const CLOSING_PROMPT: &str = "Tool calling is finished. Using the conversation and any tool \
results above, give the user a clear, final natural-language answer. Do not request tools.";

/// Produces the terminal assistant message.
///
/// If the last message is already a well-formed final assistant turn, it is
/// passed through untouched. Otherwise the model is re-invoked once with
/// tool calling disabled to compose a closing answer; if that also yields
/// nothing, a deterministic fallback is appended. The one case that escapes
/// as an error is a retry failure after the primary model invocation already
/// failed, which the engine reports as fatal.
pub struct FinalizeResponse {
    model: Arc<dyn ModelClient>,
    timeout: Duration,
}

impl FinalizeResponse {
    #[must_use]
    pub fn new(model: Arc<dyn ModelClient>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    async fn closing_answer(&self, state: &ConversationState) -> Option<String> {
        let request = ModelRequest {
            messages: state.messages().to_vec(),
            system_context: Some(CLOSING_PROMPT.to_string()),
            tool_schemas: Vec::new(),
        };
        match tokio::time::timeout(self.timeout, self.model.invoke(request)).await {
            Ok(Ok(turn)) if turn.tool_calls.is_empty() => turn.content.filter(|c| !c.is_empty()),
            Ok(Ok(_)) => {
                tracing::warn!("finalization retry requested tools despite none advertised");
                None
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "finalization retry failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "finalization retry timed out");
                None
            }
        }
    }
}

#[async_trait]
impl Node for FinalizeResponse {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError> {
        // Pass-through: the model already produced a usable answer.
        if state.last_message().is_some_and(Message::is_final_assistant) {
            return Ok(NodeUpdate::default());
        }

        if let Some(answer) = self.closing_answer(state).await {
            return Ok(NodeUpdate::default().with_message(Message::assistant(answer)));
        }

        // A failed retry on top of a failed primary invocation is the one
        // doubly-failed case that must reach the caller.
        if state.metadata.contains_key(ConversationState::MODEL_ERROR_KEY) {
            return Err(NodeError::Model {
                message: "model invocation failed and the finalization retry produced no content"
                    .to_string(),
            });
        }

        tracing::warn!(step = ctx.step, "finalization fell back to the deterministic reply");
        Ok(NodeUpdate::default().with_message(Message::assistant(FALLBACK_REPLY)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{AiTurn, ModelError};
    use crate::message::ToolCall;
    use serde_json::json;

    struct AnswerModel(&'static str);

    #[async_trait]
    impl ModelClient for AnswerModel {
        async fn invoke(&self, _request: ModelRequest) -> Result<AiTurn, ModelError> {
            Ok(AiTurn {
                content: Some(self.0.to_string()),
                ..AiTurn::default()
            })
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl ModelClient for BrokenModel {
        async fn invoke(&self, _request: ModelRequest) -> Result<AiTurn, ModelError> {
            Err(ModelError::Provider("down".into()))
        }
    }

    fn ctx() -> NodeContext {
        let (tx, _rx) = flume::unbounded();
        NodeContext::new(
            crate::graphs::NodeId::Finalize,
            1,
            "x1",
            false,
            crate::event_bus::EventEmitter::new(tx),
        )
    }

    #[tokio::test]
    async fn passes_through_existing_final_answer() {
        let mut state = ConversationState::new("u1", "c1", "hi");
        state.apply(NodeUpdate::default().with_message(Message::assistant("done")));
        let node = FinalizeResponse::new(Arc::new(BrokenModel), Duration::from_secs(1));
        let update = node.run(&state, ctx()).await.unwrap();
        assert!(update.messages.is_empty());
    }

    #[tokio::test]
    async fn retry_composes_closing_answer() {
        let mut state = ConversationState::new("u1", "c1", "hi");
        state.apply(NodeUpdate::default().with_message(Message::assistant_with_calls(
            "",
            vec![ToolCall::new("t", json!({}))],
        )));
        let node = FinalizeResponse::new(Arc::new(AnswerModel("wrapping up")), Duration::from_secs(1));
        let update = node.run(&state, ctx()).await.unwrap();
        assert_eq!(update.messages[0].content, "wrapping up");
    }

    #[tokio::test]
    async fn failed_retry_falls_back_deterministically() {
        let state = ConversationState::new("u1", "c1", "hi");
        let node = FinalizeResponse::new(Arc::new(BrokenModel), Duration::from_secs(1));
        let update = node.run(&state, ctx()).await.unwrap();
        assert_eq!(update.messages[0].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn double_failure_is_an_error() {
        let mut state = ConversationState::new("u1", "c1", "hi");
        state.note_model_failure("provider down");
        let node = FinalizeResponse::new(Arc::new(BrokenModel), Duration::from_secs(1));
        assert!(node.run(&state, ctx()).await.is_err());
    }
}
