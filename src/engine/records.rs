//! Per-step records and the final execution report.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::graphs::NodeId;
use crate::message::Message;
use crate::state::ConversationState;

/// How a step ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The node ran and its update was applied.
    Completed,
    /// The node failed and execution was rerouted to finalization.
    Recovered,
}

/// One executed step of a workflow run.
#[derive(Clone, Debug)]
pub struct NodeExecutionRecord {
    pub node: NodeId,
    pub step: u64,
    pub messages_before: usize,
    pub messages_after: usize,
    /// Digest of the history when the step started.
    pub digest_before: u64,
    /// Digest of the history after the step's update was applied.
    pub digest_after: u64,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub status: StepStatus,
}

/// Outcome of a completed execution.
#[derive(Clone, Debug)]
pub struct ExecutionReport {
    /// Final conversation state.
    pub state: ConversationState,
    /// Steps in execution order.
    pub records: Vec<NodeExecutionRecord>,
    /// Id shared by all events of this execution.
    pub execution_id: String,
    terminal: Message,
}

impl ExecutionReport {
    pub(crate) fn new(
        state: ConversationState,
        records: Vec<NodeExecutionRecord>,
        execution_id: String,
        terminal: Message,
    ) -> Self {
        Self {
            state,
            records,
            execution_id,
            terminal,
        }
    }

    /// The terminal assistant message. Always has non-empty content.
    #[must_use]
    pub fn terminal_message(&self) -> &Message {
        &self.terminal
    }

    /// Number of steps whose node failed and was recovered.
    #[must_use]
    pub fn recovered_steps(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == StepStatus::Recovered)
            .count()
    }
}
