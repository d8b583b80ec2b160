//! # Message Encryptor
//!
//! AES-256-GCM over raw payloads using the provider's current key version.
//!
//! ## Decryption Fallback
//!
//! When the tag does not verify under the requested version and a
//! [`KeyRotationManager`] is attached, every previous version the provider
//! reports for the grace period is tried in recency order. A tampered payload
//! fails under every key, so the fallback never weakens tamper detection.

use crate::domain::key_rotation::KeyRotationManager;
use crate::ports::inbound::PayloadCipher;
use crate::ports::outbound::KeyProvider;
use async_trait::async_trait;
use shared_crypto::{open, seal, CryptoError, SecretKey};
use shared_types::{BusError, EncryptionError, ENVELOPE_OVERHEAD};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

enum Attempt {
    Opened(Vec<u8>),
    Rejected,
    Unresolved(EncryptionError),
}

/// Payload encryptor backed by a [`KeyProvider`].
pub struct MessageEncryptor {
    provider: Arc<dyn KeyProvider>,
    rotation: Option<Arc<KeyRotationManager>>,
    owns_provider: bool,
    disposed: AtomicBool,
}

impl MessageEncryptor {
    /// Create an encryptor that owns `provider` and disposes it.
    pub fn new(provider: Arc<dyn KeyProvider>) -> Self {
        Self {
            provider,
            rotation: None,
            owns_provider: true,
            disposed: AtomicBool::new(false),
        }
    }

    /// Create an encryptor over a provider owned elsewhere.
    pub fn with_shared_provider(provider: Arc<dyn KeyProvider>) -> Self {
        Self {
            owns_provider: false,
            ..Self::new(provider)
        }
    }

    /// Enable rotation-aware decryption.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Arc<KeyRotationManager>) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// Attached rotation manager, if any.
    pub fn rotation(&self) -> Option<&Arc<KeyRotationManager>> {
        self.rotation.as_ref()
    }

    fn ensure_live(&self) -> Result<(), BusError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(BusError::Disposed);
        }
        Ok(())
    }

    async fn resolve_key(
        &self,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<SecretKey, BusError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BusError::Cancelled),
            key = self.provider.get_key(version, cancel) => key.map_err(BusError::from),
        }
    }

    async fn previous_versions(
        &self,
        rotation: &KeyRotationManager,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, BusError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BusError::Cancelled),
            versions = self.provider.get_previous_key_versions(rotation.grace_period(), cancel) => {
                versions.map_err(BusError::from)
            }
        }
    }

    async fn try_version(
        &self,
        data: &[u8],
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<Attempt, BusError> {
        let key = match self.resolve_key(version, cancel).await {
            Ok(key) => key,
            Err(BusError::Encryption(e)) => {
                debug!(version, error = %e, "Key resolution failed");
                return Ok(Attempt::Unresolved(e));
            }
            Err(e) => return Err(e),
        };

        match open(&key, data) {
            Ok(plaintext) => Ok(Attempt::Opened(plaintext)),
            Err(CryptoError::AuthenticationFailed) => Ok(Attempt::Rejected),
            Err(e) => Err(EncryptionError::unexpected("Decryption failed", e).into()),
        }
    }

    fn version_allowed(&self, version: &str) -> Result<bool, BusError> {
        match &self.rotation {
            Some(rotation) => rotation.is_key_version_valid(version),
            None => Ok(true),
        }
    }
}

#[async_trait]
impl PayloadCipher for MessageEncryptor {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BusError> {
        self.ensure_live()?;

        let version = self.provider.current_key_version();
        let key = self.resolve_key(&version, cancel).await?;

        let envelope = seal(&key, plaintext).map_err(|e| match e {
            CryptoError::EncryptionFailed(reason) => EncryptionError::EncryptionFailed(reason),
            other => EncryptionError::unexpected("Encryption failed", other),
        })?;

        debug!(version = %version, bytes = plaintext.len(), "Payload encrypted");
        Ok(envelope)
    }

    async fn decrypt(
        &self,
        data: &[u8],
        key_version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BusError> {
        if key_version.trim().is_empty() {
            return Err(BusError::empty_argument("key version"));
        }
        self.ensure_live()?;

        if data.len() < ENVELOPE_OVERHEAD {
            return Err(EncryptionError::MalformedCiphertext {
                length: data.len(),
                minimum: ENVELOPE_OVERHEAD,
            }
            .into());
        }

        let mut attempted = Vec::new();
        let mut unresolved = None;

        if self.version_allowed(key_version)? {
            attempted.push(key_version.to_string());
            match self.try_version(data, key_version, cancel).await? {
                Attempt::Opened(plaintext) => return Ok(plaintext),
                Attempt::Rejected => {}
                Attempt::Unresolved(e) => unresolved = Some(e),
            }
        } else {
            warn!(version = key_version, "Key version outside grace period");
        }

        if let Some(rotation) = &self.rotation {
            for version in self.previous_versions(rotation, cancel).await? {
                if attempted.contains(&version) || !rotation.is_key_version_valid(&version)? {
                    continue;
                }
                attempted.push(version.clone());
                if let Attempt::Opened(plaintext) =
                    self.try_version(data, &version, cancel).await?
                {
                    debug!(requested = key_version, used = %version, "Decrypted with previous key version");
                    return Ok(plaintext);
                }
            }
        }

        match unresolved {
            Some(e) if attempted.len() == 1 => Err(e.into()),
            _ => Err(EncryptionError::KeyVersionsExhausted { attempted }.into()),
        }
    }

    fn key_version(&self) -> String {
        self.provider.current_key_version()
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.owns_provider {
            self.provider.dispose().await;
        }
        debug!("Message encryptor disposed");
    }
}

impl std::fmt::Debug for MessageEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageEncryptor")
            .field("key_version", &self.provider.current_key_version())
            .field("rotation", &self.rotation.is_some())
            .field("owns_provider", &self.owns_provider)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish()
    }
}
