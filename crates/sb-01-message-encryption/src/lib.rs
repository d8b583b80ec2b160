//! # Message Encryption Subsystem (SB-01)
//!
//! Confidentiality for bus payloads without the broker knowing about it.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): key rotation registry, payload encryptor,
//!   configuration, the encrypted wrapper entity
//! - **Ports Layer** (`ports/`): `PayloadCipher` (inbound) and `KeyProvider`
//!   (outbound, may call a remote secret store)
//! - **Adapters Layer** (`adapters/`): in-memory key provider and the
//!   `EncryptionBrokerDecorator`
//!
//! ## Security Notes
//!
//! - **AEAD**: AES-256-GCM, fresh random nonce per message
//! - **Tamper Evidence**: any flipped bit fails decryption, never weakened
//! - **Rotation**: decryption falls back across previous key versions that are
//!   still inside the grace period, most recent first

pub mod adapters;
pub mod domain;
pub mod ports;

// Re-export public API
pub use adapters::decorator::EncryptionBrokerDecorator;
pub use adapters::key_provider::InMemoryKeyProvider;
pub use domain::config::{ConfigError, EncryptionConfig, KeyVersionConfig};
pub use domain::encryptor::MessageEncryptor;
pub use domain::entities::EncryptedMessageWrapper;
pub use domain::key_rotation::{KeyRotationManager, KeyVersionMetadata};
pub use ports::inbound::PayloadCipher;
pub use ports::outbound::KeyProvider;
