//! Structural checks run on every compiled graph.
//!
//! Validation enforces the properties the engine's termination argument
//! relies on, so a graph that builds successfully cannot run forever and
//! cannot strand an execution away from finalization.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::edges::NodeId;
use super::WorkflowGraph;

/// A graph that violates a structural requirement.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphValidationError {
    #[error("entry node {entry} is not part of the graph")]
    #[diagnostic(code(convograph::graph::missing_entry))]
    MissingEntry { entry: NodeId },

    #[error("finalization is unreachable from entry node {entry}")]
    #[diagnostic(
        code(convograph::graph::unreachable_finalize),
        help("every path through the graph must be able to reach the finalize stage")
    )]
    UnreachableFinalize { entry: NodeId },

    #[error("node {node} mixes conditional and unconditional out-edges")]
    #[diagnostic(
        code(convograph::graph::unconditional_fallback),
        help("an unconditional edge would shadow the conditional routing on this node")
    )]
    UnconditionalFallback { node: NodeId },

    #[error("cycle through {nodes:?} is not gated on a bounded condition")]
    #[diagnostic(
        code(convograph::graph::unbounded_cycle),
        help("every cycle must contain an edge whose condition is budget-bounded")
    )]
    UnboundedCycle { nodes: Vec<NodeId> },
}

pub(super) fn validate(graph: &WorkflowGraph) -> Result<(), GraphValidationError> {
    if !graph.contains(graph.entry()) {
        return Err(GraphValidationError::MissingEntry {
            entry: graph.entry(),
        });
    }

    for spec in graph.nodes() {
        let edges = graph.edges_from(spec.id);
        let conditional = edges.iter().filter(|e| e.condition.is_some()).count();
        if conditional > 0 && conditional != edges.len() {
            return Err(GraphValidationError::UnconditionalFallback { node: spec.id });
        }
    }

    if !reaches_finalize(graph) {
        return Err(GraphValidationError::UnreachableFinalize {
            entry: graph.entry(),
        });
    }

    if let Some(nodes) = unbounded_cycle(graph) {
        return Err(GraphValidationError::UnboundedCycle { nodes });
    }

    Ok(())
}

/// Reachability of the finalize stage from the entry.
fn reaches_finalize(graph: &WorkflowGraph) -> bool {
    let mut seen = FxHashSet::default();
    let mut frontier = vec![graph.entry()];
    while let Some(node) = frontier.pop() {
        if node == NodeId::Finalize {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        frontier.extend(graph.edges_from(node).iter().map(|e| e.target));
    }
    false
}

/// Search for a cycle in the subgraph of edges that are not gated on a
/// bounded condition. If that subgraph is acyclic, every cycle in the full
/// graph must cross a bounded edge and is therefore finite.
fn unbounded_cycle(graph: &WorkflowGraph) -> Option<Vec<NodeId>> {
    let mut unbounded: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for spec in graph.nodes() {
        let targets: Vec<NodeId> = graph
            .edges_from(spec.id)
            .iter()
            .filter(|e| !e.condition.is_some_and(|c| c.is_bounded()))
            .map(|e| e.target)
            .collect();
        unbounded.insert(spec.id, targets);
    }

    let mut finished = FxHashSet::default();
    for spec in graph.nodes() {
        let mut path = Vec::new();
        let mut on_path = FxHashSet::default();
        if let Some(cycle) = dfs(spec.id, &unbounded, &mut finished, &mut path, &mut on_path) {
            return Some(cycle);
        }
    }
    None
}

fn dfs(
    node: NodeId,
    edges: &FxHashMap<NodeId, Vec<NodeId>>,
    finished: &mut FxHashSet<NodeId>,
    path: &mut Vec<NodeId>,
    on_path: &mut FxHashSet<NodeId>,
) -> Option<Vec<NodeId>> {
    if finished.contains(&node) {
        return None;
    }
    if !on_path.insert(node) {
        let start = path.iter().position(|&n| n == node).unwrap_or(0);
        return Some(path[start..].to_vec());
    }
    path.push(node);
    if let Some(targets) = edges.get(&node) {
        for &target in targets {
            if let Some(cycle) = dfs(target, edges, finished, path, on_path) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    on_path.remove(&node);
    finished.insert(node);
    None
}
