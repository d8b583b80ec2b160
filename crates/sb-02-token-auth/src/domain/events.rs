//! Audit events emitted by the security decorator.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    Authorized,
    Unauthorized,
}

/// One access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    /// `publish` or `subscribe`.
    pub operation: String,
    /// Token subject, when the token was valid.
    pub subject: Option<String>,
    pub topic: String,
    pub message_type: String,
    /// Why access was denied.
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl SecurityEvent {
    /// Access granted.
    pub fn authorized(
        operation: &str,
        subject: Option<String>,
        topic: &str,
        message_type: &str,
    ) -> Self {
        Self {
            kind: SecurityEventKind::Authorized,
            operation: operation.to_string(),
            subject,
            topic: topic.to_string(),
            message_type: message_type.to_string(),
            reason: None,
            occurred_at: Utc::now(),
        }
    }

    /// Access denied.
    pub fn unauthorized(
        operation: &str,
        subject: Option<String>,
        topic: &str,
        message_type: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: SecurityEventKind::Unauthorized,
            operation: operation.to_string(),
            subject,
            topic: topic.to_string(),
            message_type: message_type.to_string(),
            reason: Some(reason.into()),
            occurred_at: Utc::now(),
        }
    }
}
