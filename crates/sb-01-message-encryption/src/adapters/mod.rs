//! # Adapters Layer
//!
//! - `key_provider`: in-memory `KeyProvider` built from configuration
//! - `decorator`: `MessageBroker` decorator that encrypts on publish and
//!   decrypts on delivery

pub mod decorator;
pub mod key_provider;
