//! Telemetry sink and event bus.
//!
//! The conversation loop reports what it does through a [`TelemetrySink`]:
//! named events with JSON attributes and numeric metrics. Sinks are
//! fire-and-forget; none of their methods can fail the caller.
//!
//! [`EventBus`] is the in-process implementation, built on `tokio::broadcast`
//! with typed events and filtered subscriptions. [`TracingSink`] mirrors
//! everything to `tracing`, and [`FanoutSink`] combines several sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Metric names, shared with any exporter sitting behind a sink.
pub mod metrics {
    pub const LLM_CALLS: &str = "agent.llm.calls";
    pub const LLM_LATENCY_MS: &str = "agent.llm.latency";
    pub const TOOL_CALLS: &str = "agent.tool.calls";
    pub const TOOL_LATENCY_MS: &str = "agent.tool.latency";
    pub const ITERATIONS: &str = "agent.iterations";
    pub const LOOP_LATENCY_MS: &str = "agent.latency";
    pub const ERRORS: &str = "agent.errors";
    pub const COST_USD: &str = "agent.cost";
}

/// Telemetry event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventType {
    IntentClassified,
    PromptSelected,
    ConfirmationResolved,
    IterationCompleted,
    ToolCompleted,
    LoopCompleted,
    LoopExhausted,
    CostRecorded,
    Metric,
    Error,
}

impl TelemetryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentClassified => "intent_classified",
            Self::PromptSelected => "prompt_selected",
            Self::ConfirmationResolved => "confirmation_resolved",
            Self::IterationCompleted => "iteration_completed",
            Self::ToolCompleted => "tool_completed",
            Self::LoopCompleted => "loop_completed",
            Self::LoopExhausted => "loop_exhausted",
            Self::CostRecorded => "cost_recorded",
            Self::Metric => "metric",
            Self::Error => "error",
        }
    }
}

/// A single telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub event_type: TelemetryEventType,
    pub attributes: Value,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(event_type: TelemetryEventType, attributes: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            attributes,
            timestamp: Utc::now(),
        }
    }
}

/// Destination for events and metrics emitted by the core.
pub trait TelemetrySink: Send + Sync {
    fn emit_event(&self, event_type: TelemetryEventType, attributes: Value);

    fn record_metric(&self, name: &str, value: f64, attributes: Value);
}

/// Broadcast bus that doubles as a telemetry sink.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TelemetryEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers. Returns the number of receivers;
    /// zero when nobody is listening.
    pub fn publish(&self, event: TelemetryEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to only specific event types.
    pub fn subscribe_filtered(&self, types: Vec<TelemetryEventType>) -> FilteredSubscriber {
        FilteredSubscriber {
            receiver: self.sender.subscribe(),
            filter: types.into_iter().collect(),
        }
    }

    /// Return the number of active subscribers on the channel.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for EventBus {
    fn emit_event(&self, event_type: TelemetryEventType, attributes: Value) {
        self.publish(TelemetryEvent::new(event_type, attributes));
    }

    fn record_metric(&self, name: &str, value: f64, attributes: Value) {
        self.publish(TelemetryEvent::new(
            TelemetryEventType::Metric,
            serde_json::json!({ "name": name, "value": value, "attributes": attributes }),
        ));
    }
}

/// A subscriber that only yields events matching a set of [`TelemetryEventType`]s.
pub struct FilteredSubscriber {
    receiver: broadcast::Receiver<TelemetryEvent>,
    filter: HashSet<TelemetryEventType>,
}

impl FilteredSubscriber {
    /// Receive the next event that matches the filter.
    ///
    /// Events that do not match are silently skipped.
    pub async fn recv(&mut self) -> Result<TelemetryEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.contains(&event.event_type) {
                return Ok(event);
            }
        }
    }
}

/// Logs events at debug level and metrics at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit_event(&self, event_type: TelemetryEventType, attributes: Value) {
        match event_type {
            TelemetryEventType::Error | TelemetryEventType::LoopExhausted => {
                tracing::warn!(event = event_type.as_str(), %attributes, "telemetry event")
            }
            _ => tracing::debug!(event = event_type.as_str(), %attributes, "telemetry event"),
        }
    }

    fn record_metric(&self, name: &str, value: f64, attributes: Value) {
        tracing::trace!(metric = name, value, %attributes, "telemetry metric");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn emit_event(&self, _event_type: TelemetryEventType, _attributes: Value) {}

    fn record_metric(&self, _name: &str, _value: f64, _attributes: Value) {}
}

/// Forwards to every inner sink.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }
}

impl TelemetrySink for FanoutSink {
    fn emit_event(&self, event_type: TelemetryEventType, attributes: Value) {
        for sink in &self.sinks {
            sink.emit_event(event_type, attributes.clone());
        }
    }

    fn record_metric(&self, name: &str, value: f64, attributes: Value) {
        for sink in &self.sinks {
            sink.record_metric(name, value, attributes.clone());
        }
    }
}
