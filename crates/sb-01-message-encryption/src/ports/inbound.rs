//! # Inbound Ports (Driving Ports / API)
//!
//! `PayloadCipher` is the seam the decorator depends on. `MessageEncryptor`
//! is the production implementation; tests substitute fakes through the
//! decorator's constructor.

use async_trait::async_trait;
use shared_types::{BusError, AES256_GCM};
use tokio_util::sync::CancellationToken;

/// Authenticated encryption of raw payloads.
#[async_trait]
pub trait PayloadCipher: Send + Sync {
    /// Encrypt under the current key version.
    ///
    /// Returns `nonce || ciphertext || tag`.
    async fn encrypt(
        &self,
        plaintext: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BusError>;

    /// Decrypt data that was encrypted under `key_version`.
    async fn decrypt(
        &self,
        data: &[u8],
        key_version: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, BusError>;

    /// Current key version, stamped on outbound messages.
    fn key_version(&self) -> String;

    /// Algorithm identifier, stamped on outbound messages.
    fn algorithm(&self) -> &str {
        AES256_GCM
    }

    /// Release owned resources. Calls after the first are no-ops.
    async fn dispose(&self);
}
