//! Lifecycle events emitted by pipelines and agents.
//!
//! Events go to the sink attached to a pipeline or agent, falling back to
//! the process-wide sink set with [`set_event_sink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;

/// A pipeline run began.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// A pipeline run finished successfully.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// A pipeline run stopped at a failing component.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// A component is about to process the context.
pub const COMPONENT_STARTED: &str = "component.started";
/// A component finished.
pub const COMPONENT_COMPLETED: &str = "component.completed";
/// A component failed.
pub const COMPONENT_FAILED: &str = "component.failed";
/// A disabled component was passed over.
pub const COMPONENT_SKIPPED: &str = "component.skipped";
/// An agent invoked a tool.
pub const AGENT_TOOL_CALL: &str = "agent.tool_call";
/// An agent produced its final answer.
pub const AGENT_RESPONSE: &str = "agent.response";

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Installs the process-wide sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Removes the process-wide sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Returns the process-wide sink, or a [`NoOpEventSink`] when none is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    GLOBAL_EVENT_SINK
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NoOpEventSink))
}
