//! Knowledge-base context retrieval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashSet;

use crate::clients::{Passage, Retriever};
use crate::node::{Node, NodeContext, NodeError, NodeUpdate};
use crate::state::ConversationState;

/// Fetches supporting passages for the latest user message.
///
/// Exact duplicate passages are dropped and the remainder is concatenated up
/// to a character budget. A missing retriever, a backend failure, or a
/// timeout all degrade to running without context; this stage never fails
/// the run.
pub struct RetrievalNode {
    retriever: Option<Arc<dyn Retriever>>,
    k: usize,
    char_budget: usize,
    timeout: Duration,
}

impl RetrievalNode {
    #[must_use]
    pub fn new(
        retriever: Option<Arc<dyn Retriever>>,
        k: usize,
        char_budget: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            k,
            char_budget,
            timeout,
        }
    }

    /// Join unique passages with blank lines, stopping at the budget.
    fn format_context(&self, passages: Vec<Passage>) -> Option<String> {
        let mut seen = FxHashSet::default();
        let mut context = String::new();
        for passage in passages {
            if passage.content.is_empty() || !seen.insert(passage.content.clone()) {
                continue;
            }
            let extra = passage.content.len() + if context.is_empty() { 0 } else { 2 };
            if context.len() + extra > self.char_budget {
                break;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&passage.content);
        }
        (!context.is_empty()).then_some(context)
    }
}

#[async_trait]
impl Node for RetrievalNode {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError> {
        let Some(retriever) = &self.retriever else {
            tracing::debug!("no retriever configured, skipping retrieval");
            return Ok(NodeUpdate::default());
        };
        let Some(query) = state.latest_user_message() else {
            return Ok(NodeUpdate::default());
        };

        let fetched = tokio::time::timeout(
            self.timeout,
            retriever.retrieve(&query.content, self.k),
        )
        .await;
        let passages = match fetched {
            Ok(Ok(passages)) => passages,
            Ok(Err(error)) => {
                tracing::warn!(%error, "retrieval failed, continuing without context");
                return Ok(NodeUpdate::default());
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "retrieval timed out, continuing without context");
                return Ok(NodeUpdate::default());
            }
        };

        tracing::debug!(step = ctx.step, count = passages.len(), "retrieved passages");
        match self.format_context(passages) {
            Some(context) => Ok(NodeUpdate::default().with_retrieval_context(context)),
            None => Ok(NodeUpdate::default()),
        }
    }
}
