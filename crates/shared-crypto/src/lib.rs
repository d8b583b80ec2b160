//! # Shared Crypto - Secure-Bus Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-256-GCM | Message payload encryption |
//! | `hashing` | BLAKE3 | Token fingerprints for cache keys |
//!
//! ## Security Properties
//!
//! - **AES-256-GCM**: 96-bit random nonce per message, 128-bit tag
//! - **Envelope**: `nonce(12) || ciphertext || tag(16)`, self-contained
//! - **Keys**: zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod hashing;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use hashing::{fingerprint, Fingerprint};
pub use symmetric::{open, seal, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
