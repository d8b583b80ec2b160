//! # Subscriber Side
//!
//! Handlers, the per-delivery context they receive, and the subscription
//! handle returned by `MessageBroker::subscribe`.

use async_trait::async_trait;
use shared_types::{BusError, MessageHeaders};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Handles delivered messages of type `T`.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static {
    /// Process one delivery.
    ///
    /// # Errors
    ///
    /// Any error is reported to the transport, which decides on redelivery.
    async fn handle(&self, message: T, context: DeliveryContext) -> Result<(), BusError>;
}

/// Handler built from an async closure. See [`handler_fn`].
pub struct FnHandler<F, T> {
    f: F,
    _marker: PhantomData<fn(T)>,
}

/// Wrap an async closure as a [`MessageHandler`].
pub fn handler_fn<T, F, Fut>(f: F) -> FnHandler<F, T>
where
    F: Fn(T, DeliveryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BusError>> + Send + 'static,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> MessageHandler<T> for FnHandler<F, T>
where
    T: Send + 'static,
    F: Fn(T, DeliveryContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BusError>> + Send + 'static,
{
    async fn handle(&self, message: T, context: DeliveryContext) -> Result<(), BusError> {
        (self.f)(message, context).await
    }
}

/// Transport-side acknowledgement capability.
pub trait DeliveryControl: Send + Sync {
    /// Reject the delivery. `requeue = false` routes it to the dead letter queue.
    fn reject(&self, requeue: bool);
}

/// Control that ignores rejections. For contexts built outside a transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDeliveryControl;

impl DeliveryControl for NoopDeliveryControl {
    fn reject(&self, requeue: bool) {
        debug!(requeue, "Rejection ignored (no transport control)");
    }
}

/// Metadata of a single delivery.
#[derive(Clone)]
pub struct DeliveryContext {
    /// Transport-assigned message id.
    pub message_id: Uuid,

    /// Routing type of the delivered message.
    pub message_type: String,

    /// Topic the message was published on.
    pub topic: String,

    /// Headers as published.
    pub headers: MessageHeaders,

    /// 1 for the first delivery, incremented on requeue.
    pub attempt: u32,

    control: Arc<dyn DeliveryControl>,
}

impl DeliveryContext {
    /// Create a context backed by a transport control.
    pub fn new(
        message_id: Uuid,
        message_type: impl Into<String>,
        topic: impl Into<String>,
        headers: MessageHeaders,
        control: Arc<dyn DeliveryControl>,
    ) -> Self {
        Self {
            message_id,
            message_type: message_type.into(),
            topic: topic.into(),
            headers,
            attempt: 1,
            control,
        }
    }

    /// Create a context with no transport behind it.
    pub fn detached(message_type: impl Into<String>, headers: MessageHeaders) -> Self {
        let message_type = message_type.into();
        Self::new(
            Uuid::new_v4(),
            message_type.clone(),
            message_type,
            headers,
            Arc::new(NoopDeliveryControl),
        )
    }

    /// Reject this delivery.
    pub fn reject(&self, requeue: bool) {
        self.control.reject(requeue);
    }
}

impl std::fmt::Debug for DeliveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryContext")
            .field("message_id", &self.message_id)
            .field("message_type", &self.message_type)
            .field("topic", &self.topic)
            .field("headers", &self.headers)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// A subscription handle.
///
/// When dropped, the subscription is automatically cancelled.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    message_type: String,
    token: CancellationToken,
}

impl Subscription {
    /// Create a handle that cancels `token` on drop.
    pub fn new(message_type: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_type: message_type.into(),
            token,
        }
    }

    /// Subscription id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Routing type this subscription receives.
    #[must_use]
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Returns true until unsubscribed or the transport shut down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stop receiving deliveries.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
        debug!(subscription = %self.id, message_type = %self.message_type, "Subscription dropped");
    }
}
