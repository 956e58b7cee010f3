//! Stage-level degradation paths exercised through full runs.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use common::*;
use convograph::clients::{
    AiTurn, AllowAllPermissions, ModelClient, ModelError, ModelRequest,
};
use convograph::engine::{EngineConfig, ExecutionEngine, Services};
use convograph::graphs::GraphBuilder;
use convograph::message::Role;
use convograph::state::ConversationState;

/// Echoes normally but refuses to summarize.
struct SummarizeFailModel;

#[async_trait]
impl ModelClient for SummarizeFailModel {
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
        if request
            .system_context
            .as_deref()
            .is_some_and(|c| c.starts_with("Summarize"))
        {
            return Err(ModelError::Provider("summarizer offline".into()));
        }
        Ok(AiTurn {
            content: Some("plain answer".into()),
            ..AiTurn::default()
        })
    }
}

#[tokio::test]
async fn summarization_failure_falls_back_to_truncation() {
    let config = EngineConfig::default()
        .with_memory_window(4)
        .with_retrieval_enabled(false)
        .with_tools_enabled(false);
    let graph = GraphBuilder::new(&config).build().unwrap();
    let engine = engine(config, Arc::new(SummarizeFailModel));

    let mut builder = ConversationState::builder("user-1", "conv-1");
    for i in 0..9 {
        builder = if i % 2 == 0 {
            builder.with_user_message(format!("q{i}"))
        } else {
            builder.with_assistant_message(format!("a{i}"))
        };
    }
    let initial = builder.with_user_message("latest").build();

    let report = engine.execute(&graph, initial).await.unwrap();
    let state = &report.state;

    // Truncated without a summary: window messages survive plus the answer.
    assert!(state.memory_summary.is_none());
    assert_eq!(state.messages().len(), 4 + 1);
    assert!(state.messages().iter().any(|m| m.content == "latest"));
    assert_eq!(report.terminal_message().content, "plain answer");
}

#[tokio::test]
async fn trailing_assistant_turns_beyond_the_window_keep_a_summary() {
    let config = EngineConfig::default()
        .with_memory_window(2)
        .with_retrieval_enabled(false)
        .with_tools_enabled(false);
    let graph = GraphBuilder::new(&config).build().unwrap();
    let engine = engine(config, Arc::new(EchoModel));

    // The only user message sits four assistant turns back, so the kept
    // tail cannot shrink to the window.
    let initial = ConversationState::builder("user-1", "conv-1")
        .with_user_message("what is the time")
        .with_assistant_message("a1")
        .with_assistant_message("a2")
        .with_assistant_message("a3")
        .with_assistant_message("a4")
        .build();

    let report = engine.execute(&graph, initial).await.unwrap();
    let state = &report.state;

    // Trimming could not reach the window, so the summary marks it.
    assert!(state.messages().len() > 2);
    assert!(state.memory_summary.is_some());
    assert!(state.messages().iter().any(|m| m.has_role(Role::User)));
    assert!(!report.terminal_message().content.is_empty());
}

#[tokio::test]
async fn unknown_tool_request_is_recorded_as_a_result() {
    let config = EngineConfig::default()
        .with_memory_enabled(false)
        .with_retrieval_enabled(false)
        .with_max_tool_calls(1);
    let graph = GraphBuilder::new(&config).build().unwrap();
    let model = ToolAnswerModel {
        tool: "nonexistent",
        arguments: json!({}),
    };
    let engine = engine(config, Arc::new(model));

    let report = engine.execute(&graph, state()).await.unwrap();
    let result = report
        .state
        .messages()
        .iter()
        .find(|m| m.has_role(Role::Tool))
        .expect("result message recorded");
    assert!(result.content.contains("not available"));
    assert_eq!(report.state.tool_call_count, 1);
    assert!(!report.terminal_message().content.is_empty());
}

#[tokio::test]
async fn slow_retriever_times_out_without_failing_the_run() {
    let config = EngineConfig::default()
        .with_memory_enabled(false)
        .with_tools_enabled(false)
        .with_retrieval_timeout(Duration::from_millis(20));
    let graph = GraphBuilder::new(&config).build().unwrap();
    let services = Services::new(
        Arc::new(EchoModel),
        registry(),
        Arc::new(AllowAllPermissions),
    )
    .with_retriever(Arc::new(SlowRetriever));
    let engine = ExecutionEngine::new(config, services);

    let report = engine.execute(&graph, state()).await.unwrap();
    assert!(report.state.retrieval_context.is_none());
    assert!(report.terminal_message().content.starts_with("Echo:"));
}

#[tokio::test]
async fn retrieved_context_reaches_the_model() {
    struct ContextCapturingModel;

    #[async_trait]
    impl ModelClient for ContextCapturingModel {
        async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
            let context = request.system_context.unwrap_or_default();
            Ok(AiTurn {
                content: Some(format!("seen: {context}")),
                ..AiTurn::default()
            })
        }
    }

    let config = EngineConfig::default()
        .with_memory_enabled(false)
        .with_tools_enabled(false);
    let graph = GraphBuilder::new(&config).build().unwrap();
    let services = Services::new(
        Arc::new(ContextCapturingModel),
        registry(),
        Arc::new(AllowAllPermissions),
    )
    .with_retriever(Arc::new(StaticRetriever(vec![
        convograph::clients::Passage::new("the sky is blue", 0.9),
        convograph::clients::Passage::new("the sky is blue", 0.8),
    ])));
    let engine = ExecutionEngine::new(config, services);

    let report = engine.execute(&graph, state()).await.unwrap();
    let content = &report.terminal_message().content;
    assert!(content.contains("the sky is blue"));
    // Deduplicated: the passage appears once.
    assert_eq!(content.matches("the sky is blue").count(), 1);
}
