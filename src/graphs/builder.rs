//! Graph assembly from configuration.

use rustc_hash::FxHashMap;
use serde_json::{json, Value};

use super::edges::{Edge, EdgeCondition, NodeId};
use super::validation::validate;
use super::{GraphValidationError, WorkflowGraph};
use crate::engine::EngineConfig;

/// A node entry in a compiled graph, with a snapshot of the configuration
/// that shaped it.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub id: NodeId,
    pub config: Value,
}

/// Builds a [`WorkflowGraph`] from an [`EngineConfig`].
///
/// Construction is deterministic: the same configuration always yields the
/// same topology, and the result is validated before it is returned.
pub struct GraphBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> GraphBuilder<'a> {
    #[must_use]
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Assemble and validate the graph.
    pub fn build(self) -> Result<WorkflowGraph, GraphValidationError> {
        let config = self.config;
        let mut nodes = Vec::new();
        let mut edges: FxHashMap<NodeId, Vec<Edge>> = FxHashMap::default();

        // The node the model stage hands off to once it has produced a turn.
        let after_model = if config.tools_enabled {
            NodeId::Conditional
        } else {
            NodeId::Finalize
        };
        // The node the entry-side stages funnel into.
        let before_model = if config.retrieval_enabled {
            NodeId::Retrieval
        } else {
            NodeId::Model
        };

        if config.memory_enabled {
            nodes.push(NodeSpec {
                id: NodeId::Memory,
                config: json!({ "window": config.memory_window }),
            });
            edges.insert(NodeId::Memory, vec![Edge::unconditional(before_model)]);
        }
        if config.retrieval_enabled {
            nodes.push(NodeSpec {
                id: NodeId::Retrieval,
                config: json!({
                    "k": config.retrieval_k,
                    "char_budget": config.retrieval_char_budget,
                }),
            });
            edges.insert(NodeId::Retrieval, vec![Edge::unconditional(NodeId::Model)]);
        }

        nodes.push(NodeSpec {
            id: NodeId::Model,
            config: json!({ "tools_enabled": config.tools_enabled }),
        });
        edges.insert(NodeId::Model, vec![Edge::unconditional(after_model)]);

        if config.tools_enabled {
            nodes.push(NodeSpec {
                id: NodeId::Conditional,
                config: json!({ "max_tool_calls": config.max_tool_calls }),
            });
            edges.insert(
                NodeId::Conditional,
                vec![
                    Edge::conditional(NodeId::Tool, EdgeCondition::ToolRouteChosen),
                    Edge::conditional(NodeId::Finalize, EdgeCondition::FinalizeRouteChosen),
                ],
            );

            nodes.push(NodeSpec {
                id: NodeId::Tool,
                config: json!({ "recursion_window": config.recursion_window }),
            });
            // Both out-edges are conditional: the loop back to the model is
            // gated on remaining budget, so the cycle cannot be traversed
            // unconditionally.
            edges.insert(
                NodeId::Tool,
                vec![
                    Edge::conditional(NodeId::Model, EdgeCondition::BelowToolLimit),
                    Edge::conditional(NodeId::Finalize, EdgeCondition::ToolLimitReached),
                ],
            );
        }

        nodes.push(NodeSpec {
            id: NodeId::Finalize,
            config: json!({}),
        });

        let entry = if config.memory_enabled {
            NodeId::Memory
        } else {
            before_model
        };

        let graph = WorkflowGraph::new(entry, nodes, edges, config.fingerprint());
        validate(&graph)?;
        Ok(graph)
    }
}
