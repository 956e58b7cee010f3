//! Streaming execution mode.
//!
//! A streaming run performs exactly the same graph walk as a synchronous
//! one; the only difference is where events go. The emitter writes straight
//! into the caller's channel, so the stream ends as soon as the execution
//! task finishes and drops its sender, with the `Done` event guaranteed to
//! be the last item.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::executor::{EngineError, ExecutionEngine};
use super::records::ExecutionReport;
use crate::event_bus::{Event, EventEmitter};
use crate::graphs::WorkflowGraph;
use crate::state::ConversationState;

/// Handle to a spawned streaming execution.
#[derive(Debug)]
pub struct InvocationHandle {
    join_handle: JoinHandle<Result<ExecutionReport, EngineError>>,
}

impl InvocationHandle {
    /// Abort the running execution.
    pub fn abort(&self) {
        self.join_handle.abort();
    }

    /// Returns true once the execution task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Wait for the execution to finish and return its report.
    pub async fn join(self) -> Result<ExecutionReport, EngineError> {
        self.join_handle.await?
    }
}

/// Consumer side of a streaming execution's events.
pub struct EventStream {
    receiver: flume::Receiver<Event>,
}

impl EventStream {
    /// Next event, or `None` once the execution has finished and the
    /// channel is drained.
    pub async fn next(&self) -> Option<Event> {
        self.receiver.recv_async().await.ok()
    }

    /// Collect everything remaining, ending when the stream closes.
    pub async fn collect(self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    /// Adapt into a `futures` stream for `while let Some(..) = s.next()`
    /// style consumption alongside other streams.
    #[must_use]
    pub fn into_async_stream(self) -> BoxStream<'static, Event> {
        self.receiver.into_stream().boxed()
    }
}

impl ExecutionEngine {
    /// Run `state` through `graph` on a background task, surfacing events
    /// incrementally.
    ///
    /// Token events are emitted for model output when the provider supports
    /// streaming; the terminal message arrives as the final `Done` event and
    /// is also available from the joined report.
    #[must_use]
    pub fn execute_streaming(
        &self,
        graph: Arc<WorkflowGraph>,
        state: ConversationState,
    ) -> (InvocationHandle, EventStream) {
        let (tx, rx) = flume::unbounded();
        let emitter = EventEmitter::new(tx);
        let engine = self.clone();
        let join_handle = tokio::spawn(async move {
            engine.execute_inner(&graph, state, true, emitter).await
        });

        (
            InvocationHandle { join_handle },
            EventStream { receiver: rx },
        )
    }
}
