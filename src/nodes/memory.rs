//! History trimming and summarization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clients::{ModelClient, ModelRequest};
use crate::message::{Message, Role};
use crate::node::{Node, NodeContext, NodeError, NodeUpdate};
use crate::state::ConversationState;

/// Instruction given to the model when condensing trimmed history.
pub const SUMMARY_PROMPT: &str = "Summarize the following conversation excerpt in a short \
paragraph. Preserve names, decisions, and open questions. Reply with the summary only.";

/// Summary recorded when the kept tail still exceeds the window and no model
/// summary is available. Downstream stages can always rely on a trimmed
/// history carrying a summary marker.
pub const TRUNCATION_NOTE: &str = "Earlier context was trimmed; recent turns are kept verbatim.";

/// Keeps conversation history within a fixed window.
///
/// When the history exceeds the window, the head is condensed into a summary
/// via the model and the tail is kept verbatim. If summarization fails or
/// times out, the stage falls back to plain truncation. Either way the most
/// recent user message survives, and this stage never fails the run.
pub struct MemoryManager {
    model: Arc<dyn ModelClient>,
    window: usize,
    timeout: Duration,
}

impl MemoryManager {
    #[must_use]
    pub fn new(model: Arc<dyn ModelClient>, window: usize, timeout: Duration) -> Self {
        Self {
            model,
            window,
            timeout,
        }
    }

    /// Split the history into (head to condense, tail to keep). The tail is
    /// the last `window` messages, stretched backwards if needed so the
    /// latest user message is inside it.
    fn split(&self, messages: &[Message]) -> (Vec<Message>, Vec<Message>) {
        let mut cut = messages.len().saturating_sub(self.window);
        if let Some(last_user) = messages.iter().rposition(|m| m.has_role(Role::User)) {
            cut = cut.min(last_user);
        }
        (messages[..cut].to_vec(), messages[cut..].to_vec())
    }

    async fn summarize(&self, head: &[Message]) -> Option<String> {
        let transcript = head
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let request = ModelRequest {
            messages: vec![Message::user(transcript)],
            system_context: Some(SUMMARY_PROMPT.to_string()),
            tool_schemas: Vec::new(),
        };
        match tokio::time::timeout(self.timeout, self.model.invoke(request)).await {
            Ok(Ok(turn)) => turn.content.filter(|c| !c.is_empty()),
            Ok(Err(error)) => {
                tracing::warn!(%error, "summarization failed, truncating instead");
                None
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "summarization timed out, truncating instead");
                None
            }
        }
    }
}

#[async_trait]
impl Node for MemoryManager {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError> {
        if state.messages().len() <= self.window {
            return Ok(NodeUpdate::default());
        }

        let (head, tail) = self.split(state.messages());
        let overlong_tail = tail.len() > self.window;
        if head.is_empty() {
            // The tail was stretched to cover the latest user message and
            // already spans the whole history, so there is nothing to
            // condense. Record the marker so the trim is still visible.
            return Ok(NodeUpdate::default().with_memory_summary(TRUNCATION_NOTE));
        }
        tracing::debug!(
            step = ctx.step,
            trimmed = head.len(),
            kept = tail.len(),
            "trimming conversation history"
        );

        let update = match self.summarize(&head).await {
            Some(summary) => NodeUpdate::default()
                .with_replaced_messages(tail)
                .with_memory_summary(summary),
            None if overlong_tail => NodeUpdate::default()
                .with_replaced_messages(tail)
                .with_memory_summary(TRUNCATION_NOTE),
            None => NodeUpdate::default().with_replaced_messages(tail),
        };
        Ok(update)
    }
}
