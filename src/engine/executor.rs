//! The execution engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::config::EngineConfig;
use super::records::{ExecutionReport, NodeExecutionRecord, StepStatus};
use crate::clients::{ModelClient, PermissionChecker, Retriever, ToolRegistry};
use crate::event_bus::{Event, EventBus, EventEmitter};
use crate::graphs::{NodeId, WorkflowGraph};
use crate::message::Message;
use crate::node::{Node, NodeContext};
use crate::nodes::{
    ConditionalEvaluator, FinalizeResponse, MemoryManager, ModelInvoker, RetrievalNode,
    ToolExecutor,
};
use crate::state::ConversationState;
use crate::utils::message_digest;

/// Errors that cross the engine boundary.
///
/// Everything else (retrieval failures, tool errors, denials, a single model
/// failure) is recovered inside the run and recorded in state.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("model invocation failed beyond recovery: {message}")]
    #[diagnostic(
        code(convograph::engine::model_invocation),
        help("both the primary model call and the finalization retry failed")
    )]
    ModelInvocation { message: String },

    #[error("graph routed to node {node} but no executor is registered for it")]
    #[diagnostic(code(convograph::engine::unknown_node))]
    UnknownNode { node: NodeId },

    #[error("execution task failed: {0}")]
    #[diagnostic(code(convograph::engine::join))]
    Join(#[from] tokio::task::JoinError),
}

/// External collaborators injected at engine construction.
#[derive(Clone)]
pub struct Services {
    pub model: Arc<dyn ModelClient>,
    pub retriever: Option<Arc<dyn Retriever>>,
    pub tools: Arc<dyn ToolRegistry>,
    pub permissions: Arc<dyn PermissionChecker>,
}

impl Services {
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<dyn ToolRegistry>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Self {
        Self {
            model,
            retriever: None,
            tools,
            permissions,
        }
    }

    #[must_use]
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }
}

/// Walks a compiled graph against a conversation state.
///
/// The engine is cheap to clone and safe to share; all per-run data lives in
/// the state it is given.
#[derive(Clone)]
pub struct ExecutionEngine {
    executors: Arc<FxHashMap<NodeId, Arc<dyn Node>>>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
}

impl ExecutionEngine {
    /// Wire up executors for every stage from the injected services.
    ///
    /// All six executors are registered regardless of capability flags; the
    /// graph decides which of them a run visits.
    #[must_use]
    pub fn new(config: EngineConfig, services: Services) -> Self {
        Self::with_event_bus(config, services, Arc::new(EventBus::default()))
    }

    /// Like [`ExecutionEngine::new`] with a caller-supplied event bus.
    #[must_use]
    pub fn with_event_bus(
        config: EngineConfig,
        services: Services,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut executors: FxHashMap<NodeId, Arc<dyn Node>> = FxHashMap::default();
        executors.insert(
            NodeId::Memory,
            Arc::new(MemoryManager::new(
                Arc::clone(&services.model),
                config.memory_window,
                config.model_timeout,
            )),
        );
        executors.insert(
            NodeId::Retrieval,
            Arc::new(RetrievalNode::new(
                services.retriever.clone(),
                config.retrieval_k,
                config.retrieval_char_budget,
                config.retrieval_timeout,
            )),
        );
        executors.insert(
            NodeId::Model,
            Arc::new(ModelInvoker::new(
                Arc::clone(&services.model),
                config
                    .tools_enabled
                    .then(|| Arc::clone(&services.tools)),
                config.model_timeout,
            )),
        );
        executors.insert(
            NodeId::Conditional,
            Arc::new(ConditionalEvaluator::new(config.clone())),
        );
        executors.insert(
            NodeId::Tool,
            Arc::new(ToolExecutor::new(
                Arc::clone(&services.tools),
                Arc::clone(&services.permissions),
                config.tool_timeout,
                config.max_tool_calls,
                config.recursion_window,
            )),
        );
        executors.insert(
            NodeId::Finalize,
            Arc::new(FinalizeResponse::new(
                Arc::clone(&services.model),
                config.model_timeout,
            )),
        );

        Self {
            executors: Arc::new(executors),
            config,
            event_bus,
        }
    }

    /// Configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Event bus receiving this engine's synchronous-mode events.
    #[must_use]
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run `state` through `graph` to completion.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        state: ConversationState,
    ) -> Result<ExecutionReport, EngineError> {
        self.event_bus.listen_for_events();
        let emitter = self.event_bus.get_emitter();
        self.execute_inner(graph, state, false, emitter).await
    }

    pub(super) async fn execute_inner(
        &self,
        graph: &WorkflowGraph,
        mut state: ConversationState,
        stream_tokens: bool,
        emitter: EventEmitter,
    ) -> Result<ExecutionReport, EngineError> {
        let execution_id = Uuid::new_v4().to_string();
        let mut records = Vec::new();
        let mut current = graph.entry();
        let mut step: u64 = 0;

        loop {
            step += 1;
            let executor = self
                .executors
                .get(&current)
                .ok_or(EngineError::UnknownNode { node: current })?;

            emitter.emit(Event::node_started(current, step, &execution_id));
            let ctx = NodeContext::new(current, step, &execution_id, stream_tokens, emitter.clone());
            let messages_before = state.messages().len();
            let digest_before = message_digest(state.messages());
            let started_at = Utc::now();
            let started = Instant::now();

            let span = tracing::info_span!("node", node = %current, step);
            let outcome = executor.run(&state, ctx).instrument(span).await;

            match outcome {
                Ok(update) => {
                    state.apply(update);
                    records.push(NodeExecutionRecord {
                        node: current,
                        step,
                        messages_before,
                        messages_after: state.messages().len(),
                        digest_before,
                        digest_after: message_digest(state.messages()),
                        started_at,
                        duration: started.elapsed(),
                        status: StepStatus::Completed,
                    });
                    emitter.emit(Event::node_completed(current, step, &execution_id));

                    if current == NodeId::Finalize {
                        break;
                    }
                    match graph.next_node(current, &state, &self.config) {
                        Some(next) => current = next,
                        None => {
                            tracing::warn!(node = %current, "no edge matched, finalizing");
                            current = NodeId::Finalize;
                        }
                    }
                }
                Err(error) => {
                    if current == NodeId::Finalize {
                        return Err(EngineError::ModelInvocation {
                            message: error.to_string(),
                        });
                    }
                    tracing::warn!(node = %current, %error, "node failed, rerouting to finalize");
                    state.note_model_failure(error.to_string());
                    records.push(NodeExecutionRecord {
                        node: current,
                        step,
                        messages_before,
                        messages_after: state.messages().len(),
                        digest_before,
                        digest_after: message_digest(state.messages()),
                        started_at,
                        duration: started.elapsed(),
                        status: StepStatus::Recovered,
                    });
                    current = NodeId::Finalize;
                }
            }
        }

        let terminal = self.terminal_of(&state)?;
        emitter.emit(Event::done(&execution_id, terminal.clone()));
        Ok(ExecutionReport::new(state, records, execution_id, terminal))
    }

    fn terminal_of(&self, state: &ConversationState) -> Result<Message, EngineError> {
        state
            .terminal_message()
            .cloned()
            .ok_or_else(|| EngineError::ModelInvocation {
                message: "execution completed without a terminal assistant message".to_string(),
            })
    }
}
