//! # Audit Sinks
//!
//! `TracingSecurityEventLogger` writes to the `audit` tracing target.
//! `RecordingSecurityEventLogger` keeps events in memory for inspection.

use crate::domain::events::{SecurityEvent, SecurityEventKind};
use crate::ports::outbound::SecurityEventLogger;
use parking_lot::Mutex;
use tracing::{info, warn};

/// Audit sink writing structured events to the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSecurityEventLogger;

impl TracingSecurityEventLogger {
    pub fn new() -> Self {
        Self
    }
}

impl SecurityEventLogger for TracingSecurityEventLogger {
    fn log(&self, event: SecurityEvent) {
        let subject = event.subject.as_deref().unwrap_or("");
        match event.kind {
            SecurityEventKind::Authorized => {
                info!(target: "audit", event = "authorized", operation = %event.operation, subject, topic = %event.topic, message_type = %event.message_type);
            }
            SecurityEventKind::Unauthorized => {
                warn!(target: "audit", event = "unauthorized", operation = %event.operation, subject, topic = %event.topic, message_type = %event.message_type, reason = event.reason.as_deref().unwrap_or(""));
            }
        }
    }
}

/// Audit sink that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingSecurityEventLogger {
    events: Mutex<Vec<SecurityEvent>>,
}

impl RecordingSecurityEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events of `kind`.
    pub fn count(&self, kind: SecurityEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SecurityEventLogger for RecordingSecurityEventLogger {
    fn log(&self, event: SecurityEvent) {
        self.events.lock().push(event);
    }
}
