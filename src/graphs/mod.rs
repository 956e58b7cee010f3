//! Workflow graph construction, validation, and caching.
//!
//! A [`WorkflowGraph`] is a compiled, immutable routing table derived from an
//! [`EngineConfig`](crate::engine::EngineConfig). The node set is closed and
//! the builder wires edges so that every cycle passes through a condition
//! bounded by the tool-call budget, which is what guarantees termination
//! before any node runs.

mod builder;
mod cache;
mod edges;
mod validation;

#[cfg(test)]
mod tests;

pub use builder::{GraphBuilder, NodeSpec};
pub use cache::GraphCache;
pub use edges::{Edge, EdgeCondition, NodeId};
pub use validation::GraphValidationError;

use rustc_hash::FxHashMap;

use crate::engine::EngineConfig;
use crate::state::ConversationState;

/// Compiled workflow topology.
#[derive(Clone, Debug)]
pub struct WorkflowGraph {
    entry: NodeId,
    nodes: Vec<NodeSpec>,
    edges: FxHashMap<NodeId, Vec<Edge>>,
    fingerprint: u64,
}

impl WorkflowGraph {
    pub(crate) fn new(
        entry: NodeId,
        nodes: Vec<NodeSpec>,
        edges: FxHashMap<NodeId, Vec<Edge>>,
        fingerprint: u64,
    ) -> Self {
        Self {
            entry,
            nodes,
            edges,
            fingerprint,
        }
    }

    /// First node executed by a run of this graph.
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Nodes present in this graph, in build order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    /// Returns true if the graph contains `node`.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.iter().any(|spec| spec.id == node)
    }

    /// Out-edges of `node`, in evaluation order.
    #[must_use]
    pub fn edges_from(&self, node: NodeId) -> &[Edge] {
        self.edges.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Fingerprint of the configuration this graph was built from.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Select the next node after `from` given the current state.
    ///
    /// Edges are evaluated in declaration order and the first match wins.
    /// `None` means `from` is terminal (or, for a node with only conditional
    /// edges, that no condition held, which validation makes unreachable).
    #[must_use]
    pub fn next_node(
        &self,
        from: NodeId,
        state: &ConversationState,
        config: &EngineConfig,
    ) -> Option<NodeId> {
        self.edges_from(from)
            .iter()
            .find(|edge| {
                edge.condition
                    .is_none_or(|condition| condition.evaluate(state, config))
            })
            .map(|edge| edge.target)
    }
}
