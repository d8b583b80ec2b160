//! # Encrypted Envelope Layout
//!
//! Wire layout of an encrypted payload:
//!
//! ```text
//! ┌──────────────┬───────────────────────┬──────────────┐
//! │ nonce (12 B) │ ciphertext (N bytes)  │ tag (16 B)   │
//! └──────────────┴───────────────────────┴──────────────┘
//! ```
//!
//! Total length is always `N + 28`; anything shorter is malformed.

/// AES-GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_SIZE: usize = 16;

/// Fixed per-message overhead of the envelope.
pub const ENVELOPE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Symmetric key length in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Algorithm identifier stamped on encrypted messages.
pub const AES256_GCM: &str = "AES256-GCM";

/// Well-known header names.
pub mod header_names {
    /// Key version used to encrypt the payload.
    pub const KEY_VERSION: &str = "KeyVersion";
    /// Encryption algorithm identifier.
    pub const ALGORITHM: &str = "Algorithm";
    /// RFC 3339 timestamp of encryption.
    pub const ENCRYPTED_AT: &str = "EncryptedAt";
    /// `Authorization: Bearer <token>` (or the raw token).
    pub const AUTHORIZATION: &str = "Authorization";
    /// Fallback token header.
    pub const AUTH_TOKEN: &str = "X-Auth-Token";
}

/// Scheme prefix accepted on the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";
