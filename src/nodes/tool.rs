//! Tool execution and repeat-call detection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use serde_json::json;

use crate::clients::{PermissionChecker, ToolRegistry};
use crate::event_bus::Event;
use crate::message::{Message, ToolCall};
use crate::node::{Node, NodeContext, NodeError, NodeUpdate};
use crate::state::ConversationState;
use crate::utils::argument_fingerprint;

/// Flags unproductive repeated tool invocations.
///
/// The guard keeps a trailing window over the calls already executed in this
/// conversation. A pending call is a repeat when the same (tool name,
/// argument fingerprint) pair already occurs at least twice within that
/// window; only executed calls with a recorded result count as occurrences.
#[derive(Clone, Copy, Debug)]
pub struct RecursionGuard {
    window: usize,
}

impl RecursionGuard {
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Returns true if executing `call` again would not make progress.
    #[must_use]
    pub fn is_repeat(&self, state: &ConversationState, call: &ToolCall) -> bool {
        let candidate = (call.name.as_str(), argument_fingerprint(&call.arguments));
        let recent = self.executed_pairs(state);
        let occurrences = recent
            .iter()
            .rev()
            .take(self.window)
            .filter(|(name, hash)| (name.as_str(), *hash) == candidate)
            .count();
        occurrences >= 2
    }

    /// (name, argument fingerprint) of each executed call, oldest first.
    /// A call counts as executed only once a result message answers it.
    fn executed_pairs(&self, state: &ConversationState) -> Vec<(String, u64)> {
        let answered: FxHashSet<&str> = state
            .messages()
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        state
            .messages()
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .filter(|call| answered.contains(call.id.as_str()))
            .map(|call| (call.name.clone(), argument_fingerprint(&call.arguments)))
            .collect()
    }
}

/// Executes the pending tool calls of the latest assistant turn.
///
/// Every executed call is authorized, resolved, and run under a timeout.
/// Failures, denials, and unknown tools all become result messages rather
/// than errors, and every executed call consumes budget, so the workflow
/// always moves forward. Calls beyond the remaining budget, and calls the
/// recursion guard flags as non-progressing repeats, are not executed at
/// all: they get a synthetic result message and consume no budget.
pub struct ToolExecutor {
    registry: Arc<dyn ToolRegistry>,
    permissions: Arc<dyn PermissionChecker>,
    timeout: Duration,
    max_tool_calls: u32,
    guard: RecursionGuard,
}

impl ToolExecutor {
    #[must_use]
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        permissions: Arc<dyn PermissionChecker>,
        timeout: Duration,
        max_tool_calls: u32,
        recursion_window: usize,
    ) -> Self {
        Self {
            registry,
            permissions,
            timeout,
            max_tool_calls,
            guard: RecursionGuard::new(recursion_window),
        }
    }

    async fn process_call(
        &self,
        state: &ConversationState,
        ctx: &NodeContext,
        call: &ToolCall,
    ) -> Message {
        let authorized = self
            .permissions
            .authorize(&state.user_id, &call.name, &call.arguments)
            .await;
        if !authorized {
            tracing::warn!(tool = %call.name, user = %state.user_id, "tool call denied");
            ctx.emit(Event::tool_outcome(
                &ctx.execution_id,
                &call.name,
                &call.id,
                "denied",
                None,
            ));
            return Message::tool_result(
                &call.id,
                format!("Permission denied: you are not allowed to use '{}'.", call.name),
            );
        }

        let Some(tool) = self.registry.resolve(&call.name) else {
            tracing::warn!(tool = %call.name, "unknown tool requested");
            ctx.emit(Event::tool_outcome(
                &ctx.execution_id,
                &call.name,
                &call.id,
                "unknown",
                None,
            ));
            return Message::tool_result(
                &call.id,
                format!("Tool '{}' is not available.", call.name),
            );
        };

        let invocation = tool.invoke(call.arguments.clone());
        match tokio::time::timeout(self.timeout, invocation).await {
            Ok(Ok(result)) => {
                ctx.emit(Event::tool_outcome(
                    &ctx.execution_id,
                    &call.name,
                    &call.id,
                    "ok",
                    Some(result.clone()),
                ));
                let rendered = match &result {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Message::tool_result(&call.id, rendered)
            }
            Ok(Err(error)) => {
                tracing::warn!(tool = %call.name, %error, "tool execution failed");
                ctx.emit(Event::tool_outcome(
                    &ctx.execution_id,
                    &call.name,
                    &call.id,
                    "error",
                    Some(json!({ "error": error.to_string() })),
                ));
                Message::tool_result(&call.id, format!("Tool '{}' failed: {error}", call.name))
            }
            Err(_) => {
                tracing::warn!(tool = %call.name, timeout = ?self.timeout, "tool call timed out");
                ctx.emit(Event::tool_outcome(
                    &ctx.execution_id,
                    &call.name,
                    &call.id,
                    "timeout",
                    None,
                ));
                Message::tool_result(&call.id, format!("Tool '{}' timed out.", call.name))
            }
        }
    }
}

#[async_trait]
impl Node for ToolExecutor {
    async fn run(
        &self,
        state: &ConversationState,
        ctx: NodeContext,
    ) -> Result<NodeUpdate, NodeError> {
        let pending = state.pending_tool_calls();
        let mut update = NodeUpdate::default();
        let mut executed: u32 = 0;
        for call in pending {
            if state.tool_call_count + executed >= self.max_tool_calls {
                tracing::warn!(tool = %call.name, "tool call budget exhausted, call not run");
                ctx.emit(Event::tool_outcome(
                    &ctx.execution_id,
                    &call.name,
                    &call.id,
                    "budget_exhausted",
                    None,
                ));
                update = update.with_message(Message::tool_result(
                    &call.id,
                    format!("Tool '{}' was not run: the tool call budget is exhausted.", call.name),
                ));
                continue;
            }
            if self.guard.is_repeat(state, call) {
                tracing::warn!(tool = %call.name, "repeated call flagged, call not run");
                ctx.emit(Event::tool_outcome(
                    &ctx.execution_id,
                    &call.name,
                    &call.id,
                    "repeat",
                    None,
                ));
                update = update.with_message(Message::tool_result(
                    &call.id,
                    format!(
                        "Tool '{}' was not run again: an identical call is already answered above.",
                        call.name
                    ),
                ));
                continue;
            }
            let result = self.process_call(state, &ctx, call).await;
            executed += 1;
            update = update.with_message(result).with_tool_calls_delta(1);
        }
        Ok(update)
    }
}
