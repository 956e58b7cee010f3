//! Event publication and subscription for workflow executions.
//!
//! Nodes and the engine emit [`Event`]s through an [`EventEmitter`]. In the
//! synchronous path events flow into an [`EventBus`] that fans them out to
//! registered [`EventSink`]s on a background listener task. In the streaming
//! path the emitter writes straight into the caller's channel instead, so
//! the stream ends exactly when the execution task finishes.

mod bus;
mod event;
mod sink;

pub use bus::{EventBus, EventEmitter};
pub use event::{DoneEvent, Event, NodeLifecycleEvent, TokenEvent, ToolEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, TracingSink};
