//! # Error Types
//!
//! Two domain families cover the security layer:
//!
//! - [`EncryptionError`]: malformed ciphertext, key resolution, key encoding,
//!   exhausted key versions.
//! - [`AuthenticationError`]: missing token, invalid token, insufficient
//!   permissions.
//!
//! [`BusError`] is the single surface returned by every broker operation. It
//! wraps both families and keeps argument validation (`InvalidArgument`) in
//! its own variant.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed lower-level error retained as a `source`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors raised while encrypting, decrypting or resolving keys.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// Payload is shorter than nonce + tag.
    #[error("Malformed ciphertext: {length} bytes is shorter than the {minimum}-byte envelope")]
    MalformedCiphertext { length: usize, minimum: usize },

    /// Key material could not be decoded.
    #[error("Invalid key encoding for version {version}: {reason}")]
    InvalidKeyEncoding { version: String, reason: String },

    /// Key material has the wrong length.
    #[error("Invalid key size for version {version}: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        version: String,
        expected: usize,
        actual: usize,
    },

    /// No key exists for the requested version.
    #[error("Key version not found: {0}")]
    KeyNotFound(String),

    /// Every eligible key version failed to authenticate the payload.
    #[error("Decryption failed: no valid key version authenticated the payload (tried {attempted:?})")]
    KeyVersionsExhausted { attempted: Vec<String> },

    /// The AEAD primitive refused to encrypt.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Algorithm other than AES256-GCM requested.
    #[error("Unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Required metadata header missing from an encrypted delivery.
    #[error("Encrypted delivery is missing the {0} header")]
    MissingHeader(String),

    /// Any other failure, wrapped with the original error as cause.
    #[error("{context}: {source}")]
    Unexpected {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl EncryptionError {
    /// Wrap a lower-level error with context.
    pub fn unexpected(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Unexpected {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Errors raised when a caller cannot be authenticated or authorized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No bearer token was presented.
    #[error("Authentication token required")]
    TokenRequired,

    /// The token failed validation (signature, issuer, audience, expiry, format).
    #[error("Invalid authentication token")]
    InvalidToken,

    /// The token is valid but its roles do not grant the operation.
    #[error("Insufficient permissions for {operation}")]
    InsufficientPermissions { operation: String },

    /// Authentication configuration is incomplete or inconsistent.
    #[error("Invalid authentication configuration: {0}")]
    Configuration(String),
}

/// Unified error surface of broker operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// An argument was empty or otherwise unusable. Raised before any crypto or I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Encryption-family failure.
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    /// Authentication-family failure.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The operation was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,

    /// Broker has not been started.
    #[error("Broker is not running")]
    NotRunning,

    /// Broker has been disposed.
    #[error("Broker has been disposed")]
    Disposed,

    /// Message could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying transport failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A subscriber handler failed.
    #[error("Handler error: {0}")]
    Handler(String),
}

impl BusError {
    /// Build an `InvalidArgument` error for an empty parameter.
    pub fn empty_argument(name: &str) -> Self {
        Self::InvalidArgument(format!("{name} must not be empty"))
    }

    /// Returns true for encryption-family errors.
    #[must_use]
    pub fn is_encryption(&self) -> bool {
        matches!(self, Self::Encryption(_))
    }

    /// Returns true for authentication-family errors.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
