//! # Broker Contract
//!
//! The publish/subscribe surface shared by transports and decorators.

use crate::message::BusMessage;
use crate::subscriber::{MessageHandler, Subscription};
use async_trait::async_trait;
use shared_types::{BusError, MessageHeaders};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Options attached to an outgoing message.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Logical topic. Defaults to the message type when absent.
    pub topic: Option<String>,

    /// Caller-supplied headers.
    pub headers: MessageHeaders,

    /// Explicit message id. Generated when absent.
    pub message_id: Option<Uuid>,
}

impl PublishOptions {
    /// Options with no topic and no headers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Topic to use for a message of type `T`.
    #[must_use]
    pub fn topic_or<T: BusMessage>(&self) -> &str {
        self.topic.as_deref().unwrap_or(T::MESSAGE_TYPE)
    }
}

/// Options attached to a subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Only deliver messages published on this topic. All topics when absent.
    pub topic: Option<String>,
}

impl SubscribeOptions {
    /// Options with no topic filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// Publish/subscribe broker.
///
/// Implemented by transports and by the security decorators, which wrap any
/// other `MessageBroker`. Every operation observes the cancellation token.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a message.
    ///
    /// # Errors
    ///
    /// Transport, serialization, cancellation, or decorator-specific errors.
    async fn publish<T: BusMessage>(
        &self,
        message: T,
        options: PublishOptions,
        cancel: &CancellationToken,
    ) -> Result<(), BusError>;

    /// Register a handler for messages of type `T`.
    ///
    /// # Errors
    ///
    /// Transport, cancellation, or decorator-specific errors.
    async fn subscribe<T, H>(
        &self,
        handler: H,
        options: SubscribeOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription, BusError>
    where
        T: BusMessage,
        H: MessageHandler<T>;

    /// Begin accepting publishes.
    async fn start(&self, cancel: &CancellationToken) -> Result<(), BusError>;

    /// Stop accepting publishes.
    async fn stop(&self, cancel: &CancellationToken) -> Result<(), BusError>;

    /// Release all resources. Calls after the first are no-ops.
    async fn dispose(&self);
}

#[async_trait]
impl<B: MessageBroker> MessageBroker for Arc<B> {
    async fn publish<T: BusMessage>(
        &self,
        message: T,
        options: PublishOptions,
        cancel: &CancellationToken,
    ) -> Result<(), BusError> {
        (**self).publish(message, options, cancel).await
    }

    async fn subscribe<T, H>(
        &self,
        handler: H,
        options: SubscribeOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription, BusError>
    where
        T: BusMessage,
        H: MessageHandler<T>,
    {
        (**self).subscribe(handler, options, cancel).await
    }

    async fn start(&self, cancel: &CancellationToken) -> Result<(), BusError> {
        (**self).start(cancel).await
    }

    async fn stop(&self, cancel: &CancellationToken) -> Result<(), BusError> {
        (**self).stop(cancel).await
    }

    async fn dispose(&self) {
        (**self).dispose().await;
    }
}
