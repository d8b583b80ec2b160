//! # Domain Layer
//!
//! Key rotation, payload encryption and configuration. No transport I/O.

pub mod config;
pub mod encryptor;
pub mod entities;
pub mod key_rotation;
