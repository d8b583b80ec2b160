//! # Shared Bus - Broker Contract
//!
//! The small capability set every broker, plain or decorated, satisfies:
//! `publish`, `subscribe`, `start`, `stop`, `dispose`.
//!
//! ## Decorator Composition
//!
//! ```text
//! caller ──publish()──→ [Security] ──→ [Encryption] ──→ [Broker]
//!                                                          │
//! handler ←──────────── [Security] ←── [Encryption] ←──────┘
//! ```
//!
//! Decorators wrap any `MessageBroker` and are themselves `MessageBroker`s,
//! so composition order is chosen by the caller.
//!
//! ## Reference Transport
//!
//! `InMemoryBroker` fans deliveries out over `tokio::sync::broadcast`.
//! Rejected deliveries land in a dead letter queue for investigation.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod broker;
pub mod memory;
pub mod message;
pub mod subscriber;

// Re-export main types
pub use broker::{MessageBroker, PublishOptions, SubscribeOptions};
pub use memory::{DeadLetter, InMemoryBroker};
pub use message::{decode, encode, BusMessage};
pub use subscriber::{
    handler_fn, DeliveryContext, DeliveryControl, MessageHandler, NoopDeliveryControl,
    Subscription,
};
pub use tokio_util::sync::CancellationToken;

/// Maximum deliveries to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Dead Letter Queue topic for rejected messages.
pub const DLQ_TOPIC: &str = "dlq.rejected";

/// Maximum delivery attempts when a handler rejects with requeue.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 3;
