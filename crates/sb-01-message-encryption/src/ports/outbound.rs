//! # Outbound Ports (Driven Ports / SPI)
//!
//! Key material is resolved through a `KeyProvider`, which may call out to a
//! remote secret store. These are the only genuine suspension points of the
//! encryption path besides the broker itself.

use async_trait::async_trait;
use shared_crypto::SecretKey;
use shared_types::EncryptionError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source of versioned symmetric keys.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Version identifier new messages are encrypted under.
    fn current_key_version(&self) -> String;

    /// Resolve the 32-byte key for `version`.
    ///
    /// # Errors
    ///
    /// * `EncryptionError::KeyNotFound` - No key stored under that version
    /// * `EncryptionError::InvalidKeySize` / `InvalidKeyEncoding` - Bad material
    /// * `EncryptionError::Unexpected` - Secret store unreachable
    async fn get_key(
        &self,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<SecretKey, EncryptionError>;

    /// Non-current versions still eligible for decryption, most recent first.
    async fn get_previous_key_versions(
        &self,
        grace_period: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, EncryptionError>;

    /// Release owned resources. Default: nothing to release.
    async fn dispose(&self) {}
}
