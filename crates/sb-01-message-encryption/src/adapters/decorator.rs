//! # Encryption Broker Decorator
//!
//! Wraps any [`MessageBroker`] so payloads are encrypted on publish and
//! decrypted before the caller's handler sees them.
//!
//! ## Publish
//!
//! ```text
//! T ──encode──→ bytes ──encrypt──→ EncryptedMessageWrapper ──→ inner.publish
//!                                   + KeyVersion / Algorithm / EncryptedAt
//! ```
//!
//! ## Delivery
//!
//! The inner broker only ever sees [`EncryptedMessageWrapper`]. A wrapper
//! that cannot be decrypted or decoded is rejected without requeue and the
//! failure is returned as an encryption error; the caller's handler is not
//! invoked.

use crate::domain::entities::EncryptedMessageWrapper;
use crate::ports::inbound::PayloadCipher;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use shared_bus::{
    decode, encode, BusMessage, DeliveryContext, MessageBroker, MessageHandler, PublishOptions,
    SubscribeOptions, Subscription,
};
use shared_types::{header_names, BusError, EncryptionError, MessageHeaders};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Broker decorator adding payload encryption.
pub struct EncryptionBrokerDecorator<B> {
    inner: B,
    cipher: Arc<dyn PayloadCipher>,
    enabled: bool,
    disposed: AtomicBool,
    shutdown: CancellationToken,
}

impl<B: MessageBroker> EncryptionBrokerDecorator<B> {
    /// Wrap `inner`. When `enabled` is false every call passes straight through.
    pub fn new(inner: B, cipher: Arc<dyn PayloadCipher>, enabled: bool) -> Self {
        Self {
            inner,
            cipher,
            enabled,
            disposed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Whether payloads are being encrypted.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The wrapped broker.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn metadata_headers(&self) -> MessageHeaders {
        MessageHeaders::new()
            .with(header_names::KEY_VERSION, self.cipher.key_version())
            .with(header_names::ALGORITHM, self.cipher.algorithm())
            .with(
                header_names::ENCRYPTED_AT,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            )
    }
}

#[async_trait]
impl<B: MessageBroker> MessageBroker for EncryptionBrokerDecorator<B> {
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

        let plaintext = encode(&message)
            .map_err(|e| EncryptionError::unexpected("Failed to serialize message", e))?;
        let encrypted_payload = self.cipher.encrypt(&plaintext, cancel).await?;

        let wrapper = EncryptedMessageWrapper {
            encrypted_payload,
            message_type: T::MESSAGE_TYPE.to_string(),
        };

        let mut headers = self.metadata_headers();
        headers.merge_missing(&options.headers);
        let outgoing = PublishOptions {
            topic: Some(options.topic_or::<T>().to_string()),
            headers,
            message_id: options.message_id,
        };

        // The plaintext never reaches the transport once cancelled.
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }

        debug!(
            message_type = T::MESSAGE_TYPE,
            key_version = %self.cipher.key_version(),
            "Publishing encrypted message"
        );
        self.inner.publish(wrapper, outgoing, cancel).await
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

        let adapter: DecryptingHandler<T, H> = DecryptingHandler {
            cipher: Arc::clone(&self.cipher),
            handler,
            cancel: self.shutdown.child_token(),
            _marker: PhantomData,
        };

        debug!(message_type = T::MESSAGE_TYPE, "Subscribing through decryption");
        self.inner
            .subscribe::<EncryptedMessageWrapper, _>(adapter, options, cancel)
            .await
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
        self.shutdown.cancel();
        self.cipher.dispose().await;
        self.inner.dispose().await;
        debug!("Encryption decorator disposed");
    }
}

/// Decrypts wrappers and forwards the original message to the caller's handler.
struct DecryptingHandler<T, H> {
    cipher: Arc<dyn PayloadCipher>,
    handler: H,
    cancel: CancellationToken,
    _marker: PhantomData<fn(T)>,
}

impl<T: BusMessage, H: MessageHandler<T>> DecryptingHandler<T, H> {
    async fn open(
        &self,
        wrapper: &EncryptedMessageWrapper,
        context: &DeliveryContext,
    ) -> Result<T, BusError> {
        let key_version = context
            .headers
            .get(header_names::KEY_VERSION)
            .ok_or_else(|| EncryptionError::MissingHeader(header_names::KEY_VERSION.into()))?;

        let plaintext = self
            .cipher
            .decrypt(&wrapper.encrypted_payload, key_version, &self.cancel)
            .await
            .map_err(|e| match e {
                BusError::Encryption(_) | BusError::Cancelled => e,
                other => EncryptionError::unexpected("Failed to decrypt message", other).into(),
            })?;

        decode::<T>(&plaintext)
            .map_err(|e| EncryptionError::unexpected("Failed to deserialize message", e).into())
    }
}

#[async_trait]
impl<T, H> MessageHandler<EncryptedMessageWrapper> for DecryptingHandler<T, H>
where
    T: BusMessage,
    H: MessageHandler<T>,
{
    async fn handle(
        &self,
        wrapper: EncryptedMessageWrapper,
        context: DeliveryContext,
    ) -> Result<(), BusError> {
        if wrapper.message_type != T::MESSAGE_TYPE {
            return Ok(());
        }

        match self.open(&wrapper, &context).await {
            Ok(message) => {
                let mut context = context;
                context.message_type = T::MESSAGE_TYPE.to_string();
                self.handler.handle(message, context).await
            }
            Err(e) => {
                warn!(
                    message_id = %context.message_id,
                    message_type = T::MESSAGE_TYPE,
                    error = %e,
                    "Encrypted delivery rejected"
                );
                context.reject(false);
                Err(e)
            }
        }
    }
}
