//! Event sink trait and the bundled sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, trace, warn, Level};

/// Receives lifecycle events.
///
/// `try_emit` must not block or fail; sinks that cannot accept an event
/// drop it.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers an event, awaiting the sink if it needs to.
    async fn emit(&self, event_type: &str, data: Value);

    /// Delivers an event without waiting.
    fn try_emit(&self, event_type: &str, data: Value);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Value) {}

    fn try_emit(&self, _event_type: &str, _data: Value) {}
}

/// Writes events to `tracing` at a fixed level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn log(&self, event_type: &str, data: &Value) {
        match self.level {
            Level::ERROR | Level::WARN => warn!(event = %event_type, data = %data, "event"),
            Level::INFO => info!(event = %event_type, data = %data, "event"),
            Level::DEBUG => debug!(event = %event_type, data = %data, "event"),
            _ => trace!(event = %event_type, data = %data, "event"),
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Value) {
        self.log(event_type, &data);
    }

    fn try_emit(&self, event_type: &str, data: Value) {
        self.log(event_type, &data);
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().clone()
    }

    /// Returns only the event types.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Returns the events whose type starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(String, Value)> {
        self.events
            .lock()
            .iter()
            .filter(|(t, _)| t.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drops every collected event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Value) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Value) {
        self.events.lock().push((event_type.to_string(), data));
    }
}
