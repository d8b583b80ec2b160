//! # Attack Simulations
//!
//! Each module plays an attacker with access to the transport or the ability
//! to craft tokens, and asserts that nothing reaches a handler.

pub mod ciphertext_tampering;
pub mod token_forgery;
