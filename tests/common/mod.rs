//! Deterministic fakes shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use convograph::clients::{
    AiTurn, AllowAllPermissions, InMemoryToolRegistry, ModelClient, ModelError, ModelRequest,
    Passage, PermissionChecker, RetrievalError, Retriever, TokenUsage, Tool, ToolError, ToolSchema,
};
use convograph::engine::{EngineConfig, ExecutionEngine, Services};
use convograph::message::{Role, ToolCall};
use convograph::state::ConversationState;

pub const FIXED_TIMESTAMP: &str = "2025-01-15T12:00:00Z";

/// Replies with a transformation of the latest user message, or a canned
/// summary when asked to condense history.
pub struct EchoModel;

#[async_trait]
impl ModelClient for EchoModel {
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
        if request
            .system_context
            .as_deref()
            .is_some_and(|c| c.starts_with("Summarize"))
        {
            return Ok(turn("condensed summary of earlier turns"));
        }
        let latest = request
            .messages
            .iter()
            .rev()
            .find(|m| m.has_role(Role::User))
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(turn(format!("Echo: {latest}")))
    }
}

/// Requests one tool call until a tool result appears in the history, then
/// answers with the result embedded.
pub struct ToolAnswerModel {
    pub tool: &'static str,
    pub arguments: Value,
}

impl ToolAnswerModel {
    pub fn get_time() -> Self {
        Self {
            tool: "get_time",
            arguments: json!({}),
        }
    }
}

#[async_trait]
impl ModelClient for ToolAnswerModel {
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
        if let Some(result) = request
            .messages
            .iter()
            .rev()
            .find(|m| m.has_role(Role::Tool))
        {
            return Ok(turn(format!("The answer is {}.", result.content)));
        }
        Ok(AiTurn {
            tool_calls: vec![ToolCall::new(self.tool, self.arguments.clone())],
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 2,
            },
            ..AiTurn::default()
        })
    }
}

/// Requests two tool calls in a single turn until a tool result appears,
/// then answers.
pub struct TwoCallModel;

#[async_trait]
impl ModelClient for TwoCallModel {
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
        if request.messages.iter().any(|m| m.has_role(Role::Tool)) {
            return Ok(turn("Combined both results."));
        }
        Ok(AiTurn {
            tool_calls: vec![
                ToolCall::new("get_time", json!({})),
                ToolCall::new("lookup", json!({"q": "history"})),
            ],
            ..AiTurn::default()
        })
    }
}

/// Keeps requesting the identical tool call for as long as tools are
/// advertised; answers plainly once they are not.
pub struct LoopingToolModel;

#[async_trait]
impl ModelClient for LoopingToolModel {
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
        if request.tool_schemas.is_empty() {
            return Ok(turn("Stopping here with what I have."));
        }
        Ok(AiTurn {
            tool_calls: vec![ToolCall::new("lookup", json!({"q": "same"}))],
            ..AiTurn::default()
        })
    }
}

/// Like [`LoopingToolModel`] but varies the arguments on every request, so
/// the recursion guard never fires and only the budget stops the loop.
pub struct VaryingArgsToolModel;

#[async_trait]
impl ModelClient for VaryingArgsToolModel {
    async fn invoke(&self, request: ModelRequest) -> Result<AiTurn, ModelError> {
        if request.tool_schemas.is_empty() {
            return Ok(turn("Out of budget, wrapping up."));
        }
        Ok(AiTurn {
            tool_calls: vec![ToolCall::new(
                "lookup",
                json!({"q": request.messages.len()}),
            )],
            ..AiTurn::default()
        })
    }
}

/// Always fails.
pub struct FailingModel;

#[async_trait]
impl ModelClient for FailingModel {
    async fn invoke(&self, _request: ModelRequest) -> Result<AiTurn, ModelError> {
        Err(ModelError::Provider("provider unavailable".into()))
    }
}

/// Fails the first invocation, succeeds afterwards.
pub struct FailOnceModel {
    calls: Mutex<u32>,
    answer: &'static str,
}

impl FailOnceModel {
    pub fn new(answer: &'static str) -> Self {
        Self {
            calls: Mutex::new(0),
            answer,
        }
    }
}

#[async_trait]
impl ModelClient for FailOnceModel {
    async fn invoke(&self, _request: ModelRequest) -> Result<AiTurn, ModelError> {
        let mut calls = self.calls.lock();
        *calls += 1;
        if *calls == 1 {
            return Err(ModelError::Provider("transient failure".into()));
        }
        Ok(turn(self.answer))
    }
}

/// Streams its reply in fixed chunks through `invoke_streaming`.
pub struct ChunkingModel {
    pub chunks: Vec<&'static str>,
}

#[async_trait]
impl ModelClient for ChunkingModel {
    async fn invoke(&self, _request: ModelRequest) -> Result<AiTurn, ModelError> {
        Ok(turn(self.chunks.concat()))
    }

    async fn invoke_streaming(
        &self,
        _request: ModelRequest,
        chunks: flume::Sender<String>,
    ) -> Result<AiTurn, ModelError> {
        for chunk in &self.chunks {
            let _ = chunks.send((*chunk).to_string());
        }
        Ok(turn(self.chunks.concat()))
    }
}

pub struct StaticRetriever(pub Vec<Passage>);

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
        Err(RetrievalError::Backend("index offline".into()))
    }
}

pub struct SlowRetriever;

#[async_trait]
impl Retriever for SlowRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

/// Returns a fixed timestamp.
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_time".into(),
            description: "Current time".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    async fn invoke(&self, _arguments: Value) -> Result<Value, ToolError> {
        Ok(json!(FIXED_TIMESTAMP))
    }
}

/// Echoes its arguments back, so identical arguments give identical results.
pub struct LookupTool;

#[async_trait]
impl Tool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "lookup".into(),
            description: "Look something up".into(),
            parameters: json!({"type": "object"}),
        }
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        Ok(json!({ "found": arguments }))
    }
}

pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "broken".into(),
            description: "Always fails".into(),
            parameters: json!({"type": "object"}),
        }
    }

    async fn invoke(&self, _arguments: Value) -> Result<Value, ToolError> {
        Err(ToolError::Execution("backend exploded".into()))
    }
}

pub struct DenyAllPermissions;

#[async_trait]
impl PermissionChecker for DenyAllPermissions {
    async fn authorize(&self, _user_id: &str, _tool_name: &str, _arguments: &Value) -> bool {
        false
    }
}

pub fn registry() -> Arc<InMemoryToolRegistry> {
    Arc::new(
        InMemoryToolRegistry::new()
            .with_tool(Arc::new(ClockTool))
            .with_tool(Arc::new(LookupTool))
            .with_tool(Arc::new(FailingTool)),
    )
}

pub fn services(model: Arc<dyn ModelClient>) -> Services {
    Services::new(model, registry(), Arc::new(AllowAllPermissions))
}

pub fn engine(config: EngineConfig, model: Arc<dyn ModelClient>) -> ExecutionEngine {
    ExecutionEngine::new(config, services(model))
}

pub fn state() -> ConversationState {
    ConversationState::new("user-1", "conv-1", "what is the time")
}

fn turn(content: impl Into<String>) -> AiTurn {
    AiTurn {
        content: Some(content.into()),
        ..AiTurn::default()
    }
}
