//! Routing between tool execution and finalization.
//!
//! The decision lives in a free function so that the edge conditions on the
//! graph evaluate exactly the same logic the routing stage reports. The two
//! cannot drift apart.

use async_trait::async_trait;

use crate::engine::EngineConfig;
use crate::node::{Node, NodeContext, NodeError, NodeUpdate};
use crate::nodes::tool::RecursionGuard;
use crate::state::ConversationState;

/// Outcome of the routing decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Pending tool calls should be executed.
    ExecuteTool,
    /// The run should produce its terminal response.
    Finalize,
}

/// Decide where execution goes after a model turn.
///
/// Checks run in a fixed order and the first that applies wins:
/// 1. no pending tool calls: finalize;
/// 2. tool-call budget exhausted: finalize;
/// 3. every pending call is a repeat the recursion guard flags: finalize;
/// 4. otherwise: execute tools.
#[must_use]
pub fn decide(state: &ConversationState, config: &EngineConfig) -> Route {
    let pending = state.pending_tool_calls();
    if pending.is_empty() {
        return Route::Finalize;
    }
    if state.tool_call_count >= config.max_tool_calls {
        return Route::Finalize;
    }
    let guard = RecursionGuard::new(config.recursion_window);
    if pending.iter().all(|call| guard.is_repeat(state, call)) {
        return Route::Finalize;
    }
    Route::ExecuteTool
}

/// Stage wrapper around [`decide`].
///
/// The graph's edge conditions do the actual routing; this stage exists so
/// the decision shows up as an observable step of the execution.
#[derive(Clone, Debug)]
pub struct ConditionalEvaluator {
    config: EngineConfig,
}

impl ConditionalEvaluator {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Node for ConditionalEvaluator {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError> {
        let route = decide(state, &self.config);
        tracing::debug!(
            step = ctx.step,
            pending = state.pending_tool_calls().len(),
            used = state.tool_call_count,
            route = ?route,
            "routing decision"
        );
        Ok(NodeUpdate::default())
    }
}
