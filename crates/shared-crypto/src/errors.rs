//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Tag verification failed (wrong key or tampered data)
    #[error("Authentication tag mismatch")]
    AuthenticationFailed,

    /// Envelope shorter than nonce + tag
    #[error("Malformed envelope: {length} bytes, need at least {minimum}")]
    MalformedEnvelope {
        /// Actual envelope length in bytes
        length: usize,
        /// Minimum envelope length in bytes
        minimum: usize,
    },

    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },
}
