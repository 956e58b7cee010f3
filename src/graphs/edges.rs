//! Node identifiers and conditional edges.

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::nodes::conditional::{decide, Route};
use crate::state::ConversationState;

/// Identifier of a workflow stage. The set is closed: configuration selects
/// which of these participate in a graph, never adds to them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeId {
    /// Trims history and produces a summary of what was dropped.
    Memory,
    /// Searches the knowledge base for context.
    Retrieval,
    /// Invokes the language model.
    Model,
    /// Decides between tool execution and finalization.
    Conditional,
    /// Executes pending tool calls.
    Tool,
    /// Guarantees a well-formed terminal response.
    Finalize,
}

impl NodeId {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Memory => "memory",
            NodeId::Retrieval => "retrieval",
            NodeId::Model => "model",
            NodeId::Conditional => "conditional",
            NodeId::Tool => "tool",
            NodeId::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate attached to an edge.
///
/// Conditions form a closed set so that the builder can prove, statically,
/// that every cycle passes through a bounded one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeCondition {
    /// Routing decided tool execution should run.
    ToolRouteChosen,
    /// Routing decided the run should finalize.
    FinalizeRouteChosen,
    /// The tool-call budget still has headroom.
    BelowToolLimit,
    /// The tool-call budget is exhausted.
    ToolLimitReached,
}

impl EdgeCondition {
    /// Evaluate the condition against the current state.
    #[must_use]
    pub fn evaluate(self, state: &ConversationState, config: &EngineConfig) -> bool {
        match self {
            EdgeCondition::ToolRouteChosen => decide(state, config) == Route::ExecuteTool,
            EdgeCondition::FinalizeRouteChosen => decide(state, config) == Route::Finalize,
            EdgeCondition::BelowToolLimit => state.tool_call_count < config.max_tool_calls,
            EdgeCondition::ToolLimitReached => state.tool_call_count >= config.max_tool_calls,
        }
    }

    /// Returns true if the condition can only hold a bounded number of
    /// times per execution. Each tool pass raises `tool_call_count`, so any
    /// cycle gated on one of these conditions terminates.
    #[must_use]
    pub fn is_bounded(self) -> bool {
        match self {
            EdgeCondition::ToolRouteChosen | EdgeCondition::BelowToolLimit => true,
            EdgeCondition::FinalizeRouteChosen | EdgeCondition::ToolLimitReached => false,
        }
    }
}

/// A directed edge in the workflow graph.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub target: NodeId,
    pub condition: Option<EdgeCondition>,
}

impl Edge {
    /// Edge that is always taken.
    #[must_use]
    pub fn unconditional(target: NodeId) -> Self {
        Self {
            target,
            condition: None,
        }
    }

    /// Edge gated on a condition.
    #[must_use]
    pub fn conditional(target: NodeId, condition: EdgeCondition) -> Self {
        Self {
            target,
            condition: Some(condition),
        }
    }
}
