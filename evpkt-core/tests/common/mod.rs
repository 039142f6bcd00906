//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// One log line emitted by the codec.
#[derive(Debug, Clone)]
pub struct Captured {
    pub level: Level,
    pub subsystem: String,
    pub severity: String,
    pub message: String,
}

#[derive(Default)]
struct FieldVisitor {
    subsystem: String,
    severity: String,
    message: String,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "subsystem" => self.subsystem = value.to_string(),
            "severity" => self.severity = value.to_string(),
            "message" => self.message = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "subsystem" => self.subsystem = format!("{:?}", value),
            "severity" => self.severity = format!("{:?}", value),
            "message" => self.message = format!("{:?}", value),
            _ => {}
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(Captured {
            level: *event.metadata().level(),
            subsystem: visitor.subsystem,
            severity: visitor.severity,
            message: visitor.message,
        });
    }
}

/// Runs `f` with a thread-local subscriber and returns what it logged.
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<Captured>) {
    let layer = CaptureLayer::default();
    let events = layer.events.clone();
    let subscriber = Registry::default().with(layer);
    let out = tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    (out, captured)
}

/// Asserts that exactly one CRITICAL line from `subsystem` was logged and
/// returns its message.
pub fn single_critical(logs: &[Captured], subsystem: &str) -> String {
    assert_eq!(logs.len(), 1, "expected one log line, got {:?}", logs);
    let line = &logs[0];
    assert_eq!(line.level, Level::ERROR);
    assert_eq!(line.severity, "CRITICAL");
    assert_eq!(line.subsystem, subsystem);
    line.message.clone()
}
