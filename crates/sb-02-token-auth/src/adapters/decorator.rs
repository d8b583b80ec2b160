//! # Security Broker Decorator
//!
//! Wraps any [`MessageBroker`] so that only authenticated, authorized callers
//! can publish, and only deliveries carrying an authorized token reach the
//! subscriber's handler.
//!
//! ## Access Check
//!
//! ```text
//! headers ──extract──→ token? ──no──→ TokenRequired
//!                        │
//!                    validate ──false──→ InvalidToken
//!                        │
//!                    authorize(op, topic) ──false──→ InsufficientPermissions
//!                        │
//!                     granted
//! ```
//!
//! Every decision is sent to the [`SecurityEventLogger`]. Publish-side
//! failures never reach the inner broker. Delivery-side failures reject the
//! delivery without requeue and return the authentication error.

use crate::adapters::bearer::extract_bearer_token;
use crate::domain::authorization::Operation;
use crate::domain::events::SecurityEvent;
use crate::ports::inbound::{Authorizer, TokenAuthenticator};
use crate::ports::outbound::SecurityEventLogger;
use async_trait::async_trait;
use shared_bus::{
    BusMessage, DeliveryContext, MessageBroker, MessageHandler, PublishOptions, SubscribeOptions,
    Subscription,
};
use shared_types::{AuthenticationError, BusError, MessageHeaders};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared access-check state, also held by delivery adapters.
struct Guard {
    authenticator: Arc<dyn TokenAuthenticator>,
    authorizer: Arc<dyn Authorizer>,
    audit: Arc<dyn SecurityEventLogger>,
}

impl Guard {
    fn check(
        &self,
        headers: &MessageHeaders,
        operation: Operation,
        topic: &str,
        message_type: &str,
    ) -> Result<(), BusError> {
        let op = operation.as_str();
        let deny = |subject: Option<String>, error: AuthenticationError| -> Result<(), BusError> {
            self.audit.log(SecurityEvent::unauthorized(
                op,
                subject,
                topic,
                message_type,
                error.to_string(),
            ));
            Err(BusError::Authentication(error))
        };

        let Some(token) = extract_bearer_token(headers) else {
            return deny(None, AuthenticationError::TokenRequired);
        };

        let Some(claims) = self.authenticator.validated_claims(token)? else {
            return deny(None, AuthenticationError::InvalidToken);
        };

        if !self.authorizer.authorize_topic(token, op, Some(topic))? {
            return deny(
                claims.subject,
                AuthenticationError::InsufficientPermissions {
                    operation: op.to_string(),
                },
            );
        }

        self.audit.log(SecurityEvent::authorized(
            op,
            claims.subject,
            topic,
            message_type,
        ));
        Ok(())
    }
}

/// Broker decorator enforcing token authentication and role authorization.
pub struct SecurityBrokerDecorator<B> {
    inner: B,
    guard: Arc<Guard>,
    enabled: bool,
    disposed: AtomicBool,
}

impl<B: MessageBroker> SecurityBrokerDecorator<B> {
    /// Wrap `inner`. When `enabled` is false every call passes straight through.
    pub fn new(
        inner: B,
        authenticator: Arc<dyn TokenAuthenticator>,
        authorizer: Arc<dyn Authorizer>,
        audit: Arc<dyn SecurityEventLogger>,
        enabled: bool,
    ) -> Self {
        Self {
            inner,
            guard: Arc::new(Guard {
                authenticator,
                authorizer,
                audit,
            }),
            enabled,
            disposed: AtomicBool::new(false),
        }
    }

    /// Whether access checks are enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The wrapped broker.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: MessageBroker> MessageBroker for SecurityBrokerDecorator<B> {
    async fn publish<T: BusMessage>(
        &self,
        message: T,
        options: PublishOptions,
        cancel: &CancellationToken,
    ) -> Result<(), BusError> {
        if !self.enabled {
            return self.inner.publish(message, options, cancel).await;
        }
        if self.disposed.load(Ordering::SeqCst) {
            return Err(BusError::Disposed);
        }

        let topic = options.topic_or::<T>().to_string();
        self.guard
            .check(&options.headers, Operation::Publish, &topic, T::MESSAGE_TYPE)?;

        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        self.inner.publish(message, options, cancel).await
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
        if !self.enabled {
            return self.inner.subscribe(handler, options, cancel).await;
        }
        if self.disposed.load(Ordering::SeqCst) {
            return Err(BusError::Disposed);
        }

        let adapter: AuthorizingHandler<T, H> = AuthorizingHandler {
            guard: Arc::clone(&self.guard),
            handler,
            _marker: PhantomData,
        };

        debug!(message_type = T::MESSAGE_TYPE, "Subscribing through access checks");
        self.inner.subscribe(adapter, options, cancel).await
    }

    async fn start(&self, cancel: &CancellationToken) -> Result<(), BusError> {
        self.inner.start(cancel).await
    }

    async fn stop(&self, cancel: &CancellationToken) -> Result<(), BusError> {
        self.inner.stop(cancel).await
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.guard.authenticator.dispose();
        self.inner.dispose().await;
        debug!("Security decorator disposed");
    }
}

/// Checks each delivery's token before invoking the caller's handler.
struct AuthorizingHandler<T, H> {
    guard: Arc<Guard>,
    handler: H,
    _marker: PhantomData<fn(T)>,
}

#[async_trait]
impl<T, H> MessageHandler<T> for AuthorizingHandler<T, H>
where
    T: BusMessage,
    H: MessageHandler<T>,
{
    async fn handle(&self, message: T, context: DeliveryContext) -> Result<(), BusError> {
        let checked = self.guard.check(
            &context.headers,
            Operation::Subscribe,
            &context.topic,
            T::MESSAGE_TYPE,
        );

        match checked {
            Ok(()) => self.handler.handle(message, context).await,
            Err(e) => {
                context.reject(false);
                Err(e)
            }
        }
    }
}
