//! # Outbound Ports (Driven Ports / SPI)

use crate::domain::events::SecurityEvent;

/// Receives authentication and authorization audit events.
pub trait SecurityEventLogger: Send + Sync {
    /// Record one event. Must not block for long; called on the publish path.
    fn log(&self, event: SecurityEvent);
}
