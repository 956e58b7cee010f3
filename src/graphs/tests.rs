use rustc_hash::FxHashMap;
use serde_json::json;

use super::builder::NodeSpec;
use super::validation::validate;
use super::*;
use crate::engine::EngineConfig;
use crate::message::{Message, ToolCall};
use crate::state::ConversationState;

fn full_config() -> EngineConfig {
    EngineConfig::default()
}

#[test]
fn full_graph_enters_at_memory() {
    let graph = GraphBuilder::new(&full_config()).build().unwrap();
    assert_eq!(graph.entry(), NodeId::Memory);
    assert!(graph.contains(NodeId::Retrieval));
    assert!(graph.contains(NodeId::Tool));
    assert!(graph.contains(NodeId::Finalize));
}

#[test]
fn entry_falls_back_to_retrieval_then_model() {
    let config = full_config().with_memory_enabled(false);
    let graph = GraphBuilder::new(&config).build().unwrap();
    assert_eq!(graph.entry(), NodeId::Retrieval);

    let config = config.with_retrieval_enabled(false);
    let graph = GraphBuilder::new(&config).build().unwrap();
    assert_eq!(graph.entry(), NodeId::Model);
    assert!(!graph.contains(NodeId::Memory));
    assert!(!graph.contains(NodeId::Retrieval));
}

#[test]
fn disabling_tools_routes_model_straight_to_finalize() {
    let config = full_config().with_tools_enabled(false);
    let graph = GraphBuilder::new(&config).build().unwrap();
    assert!(!graph.contains(NodeId::Conditional));
    assert!(!graph.contains(NodeId::Tool));
    let edges = graph.edges_from(NodeId::Model);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target, NodeId::Finalize);
    assert!(edges[0].condition.is_none());
}

#[test]
fn tool_node_has_only_conditional_out_edges() {
    let graph = GraphBuilder::new(&full_config()).build().unwrap();
    let edges = graph.edges_from(NodeId::Tool);
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e.condition.is_some()));
}

#[test]
fn same_config_builds_identical_topology() {
    let config = full_config();
    let a = GraphBuilder::new(&config).build().unwrap();
    let b = GraphBuilder::new(&config).build().unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.entry(), b.entry());
    let ids = |g: &WorkflowGraph| g.nodes().iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
}

#[test]
fn different_config_changes_fingerprint() {
    let a = GraphBuilder::new(&full_config()).build().unwrap();
    let b = GraphBuilder::new(&full_config().with_max_tool_calls(7))
        .build()
        .unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn cache_returns_shared_graph_for_equal_configs() {
    let cache = GraphCache::new();
    let a = cache.get_or_build(&full_config()).unwrap();
    let b = cache.get_or_build(&full_config()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));

    let c = cache
        .get_or_build(&full_config().with_memory_enabled(false))
        .unwrap();
    assert!(!std::sync::Arc::ptr_eq(&a, &c));
}

#[test]
fn next_node_takes_first_matching_edge() {
    let config = full_config();
    let graph = GraphBuilder::new(&config).build().unwrap();

    // Pending tool call under budget: conditional routes to tool.
    let mut state = ConversationState::new("u1", "c1", "hi");
    state_with_pending_call(&mut state);
    assert_eq!(
        graph.next_node(NodeId::Conditional, &state, &config),
        Some(NodeId::Tool)
    );

    // Exhausted budget: same node routes to finalize.
    state.tool_call_count = config.max_tool_calls;
    assert_eq!(
        graph.next_node(NodeId::Conditional, &state, &config),
        Some(NodeId::Finalize)
    );

    // Finalize is terminal.
    assert_eq!(graph.next_node(NodeId::Finalize, &state, &config), None);
}

#[test]
fn unconditional_cycle_fails_validation() {
    let nodes = vec![
        NodeSpec {
            id: NodeId::Model,
            config: json!({}),
        },
        NodeSpec {
            id: NodeId::Tool,
            config: json!({}),
        },
        NodeSpec {
            id: NodeId::Finalize,
            config: json!({}),
        },
    ];
    let mut edges = FxHashMap::default();
    edges.insert(NodeId::Model, vec![Edge::unconditional(NodeId::Tool)]);
    edges.insert(
        NodeId::Tool,
        vec![
            Edge::unconditional(NodeId::Model),
            Edge::unconditional(NodeId::Finalize),
        ],
    );
    let graph = WorkflowGraph::new(NodeId::Model, nodes, edges, 0);
    assert!(matches!(
        validate(&graph),
        Err(GraphValidationError::UnboundedCycle { .. })
    ));
}

#[test]
fn mixed_edge_kinds_fail_validation() {
    let nodes = vec![
        NodeSpec {
            id: NodeId::Model,
            config: json!({}),
        },
        NodeSpec {
            id: NodeId::Finalize,
            config: json!({}),
        },
    ];
    let mut edges = FxHashMap::default();
    edges.insert(
        NodeId::Model,
        vec![
            Edge::conditional(NodeId::Finalize, EdgeCondition::FinalizeRouteChosen),
            Edge::unconditional(NodeId::Finalize),
        ],
    );
    let graph = WorkflowGraph::new(NodeId::Model, nodes, edges, 0);
    assert!(matches!(
        validate(&graph),
        Err(GraphValidationError::UnconditionalFallback { .. })
    ));
}

#[test]
fn graph_missing_finalize_path_fails_validation() {
    let nodes = vec![
        NodeSpec {
            id: NodeId::Model,
            config: json!({}),
        },
        NodeSpec {
            id: NodeId::Finalize,
            config: json!({}),
        },
    ];
    let graph = WorkflowGraph::new(NodeId::Model, nodes, FxHashMap::default(), 0);
    assert!(matches!(
        validate(&graph),
        Err(GraphValidationError::UnreachableFinalize { .. })
    ));
}

fn state_with_pending_call(state: &mut ConversationState) {
    let call = ToolCall::new("lookup", json!({"q": "x"}));
    let update = crate::node::NodeUpdate::default()
        .with_message(Message::assistant_with_calls("", vec![call]));
    state.apply(update);
}
