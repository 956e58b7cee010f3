//! Language-model invocation stage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::clients::{AiTurn, ModelClient, ModelError, ModelRequest, ToolRegistry};
use crate::event_bus::Event;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodeUpdate};
use crate::state::ConversationState;

/// Assistant text substituted when a provider returns a turn with neither
/// content nor tool calls.
pub const EMPTY_TURN_PLACEHOLDER: &str =
    "I wasn't able to produce a response for that. Could you rephrase?";

/// Invokes the model over the current history.
///
/// Memory summary and retrieval context are folded into the system context,
/// and tool schemas are advertised when tool calling is on. Provider errors
/// and timeouts surface as [`NodeError::Model`]; the engine recovers them by
/// rerouting to finalization.
pub struct ModelInvoker {
    model: Arc<dyn ModelClient>,
    registry: Option<Arc<dyn ToolRegistry>>,
    timeout: Duration,
}

impl ModelInvoker {
    /// `registry` of `None` disables tool advertising entirely.
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        registry: Option<Arc<dyn ToolRegistry>>,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            registry,
            timeout,
        }
    }

    fn build_request(&self, state: &ConversationState) -> ModelRequest {
        let mut context_parts = Vec::new();
        if let Some(summary) = &state.memory_summary {
            context_parts.push(format!("Summary of earlier conversation:\n{summary}"));
        }
        if let Some(retrieved) = &state.retrieval_context {
            context_parts.push(format!("Relevant reference material:\n{retrieved}"));
        }
        ModelRequest {
            messages: state.messages().to_vec(),
            system_context: (!context_parts.is_empty()).then(|| context_parts.join("\n\n")),
            tool_schemas: self
                .registry
                .as_ref()
                .map(|r| r.schemas())
                .unwrap_or_default(),
        }
    }

    async fn invoke(&self, request: ModelRequest, ctx: &NodeContext) -> Result<AiTurn, ModelError> {
        if !ctx.stream_tokens {
            return match tokio::time::timeout(self.timeout, self.model.invoke(request)).await {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout),
            };
        }

        let (chunk_tx, chunk_rx) = flume::unbounded::<String>();
        let emitter = ctx.emitter();
        let execution_id = ctx.execution_id.clone();
        // Forward chunks as token events; ends when the provider drops the
        // sender. Awaited below so tokens are published before we return.
        let forwarder = tokio::spawn(async move {
            while let Ok(chunk) = chunk_rx.recv_async().await {
                emitter.emit(Event::token(&execution_id, chunk));
            }
        });

        let result =
            match tokio::time::timeout(self.timeout, self.model.invoke_streaming(request, chunk_tx))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout),
            };
        let _ = forwarder.await;
        result
    }

    /// Fold the turn's token usage into running totals.
    fn usage_update(state: &ConversationState, turn: &AiTurn, update: NodeUpdate) -> NodeUpdate {
        let prior = |key: &str| {
            state
                .metadata
                .get(key)
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0)
        };
        update
            .with_metadata(
                ConversationState::PROMPT_TOKENS_KEY,
                json!(prior(ConversationState::PROMPT_TOKENS_KEY) + turn.usage.prompt_tokens),
            )
            .with_metadata(
                ConversationState::COMPLETION_TOKENS_KEY,
                json!(
                    prior(ConversationState::COMPLETION_TOKENS_KEY)
                        + turn.usage.completion_tokens
                ),
            )
    }
}

#[async_trait]
impl Node for ModelInvoker {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError> {
        let request = self.build_request(state);
        let turn = self
            .invoke(request, &ctx)
            .await
            .map_err(|error| NodeError::Model {
                message: error.to_string(),
            })?;

        let message = if turn.is_empty() {
            tracing::warn!(step = ctx.step, "model returned an empty turn");
            Message::assistant(EMPTY_TURN_PLACEHOLDER)
        } else if turn.tool_calls.is_empty() {
            Message::assistant(turn.content.clone().unwrap_or_default())
        } else {
            Message::assistant_with_calls(
                turn.content.clone().unwrap_or_default(),
                turn.tool_calls.clone(),
            )
        };

        let update = NodeUpdate::default().with_message(message);
        Ok(Self::usage_update(state, &turn, update))
    }
}
