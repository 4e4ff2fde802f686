//! Lifecycle event bus: trait for emitting subscription events from the
//! billing engine.
//!
//! The manager accepts an `Arc<dyn EventSink>`; delivery (logs, webhooks,
//! e-mail) is the sink's concern.

use crate::types::{SubscriptionEvent, SubscriptionEventType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// Trait for emitting lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SubscriptionEvent);
}

/// No-op sink for tests and deployments without event delivery.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: SubscriptionEvent) {}
}

/// Writes every event as a structured log line.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SubscriptionEvent) {
        info!(
            event_id = %event.id,
            subscription_id = %event.subscription_id,
            event_type = ?event.event_type,
            metadata = %event.metadata,
            "Subscription event"
        );
    }
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<SubscriptionEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<SubscriptionEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: SubscriptionEventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: SubscriptionEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Per-subscription event history, retained for audit.
#[derive(Default)]
pub struct EventLog {
    by_subscription: Mutex<HashMap<Uuid, Vec<SubscriptionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for one subscription in emission order.
    pub fn history(&self, subscription_id: Uuid) -> Vec<SubscriptionEvent> {
        self.by_subscription
            .lock()
            .expect("event log mutex poisoned")
            .get(&subscription_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: SubscriptionEvent) {
        self.by_subscription
            .lock()
            .expect("event log mutex poisoned")
            .entry(event.subscription_id)
            .or_default()
            .push(event);
    }
}

/// Delivers each event to every inner sink, in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: SubscriptionEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// Convenience builder for creating a `SubscriptionEvent`.
pub fn make_event(
    event_type: SubscriptionEventType,
    subscription_id: Uuid,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
) -> SubscriptionEvent {
    SubscriptionEvent {
        id: Uuid::new_v4(),
        subscription_id,
        event_type,
        metadata,
        timestamp,
    }
}

/// Convenience: create a no-op event bus.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
