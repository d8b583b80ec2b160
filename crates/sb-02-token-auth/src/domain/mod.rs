//! # Domain Layer
//!
//! Token validation, role-based authorization, configuration and audit
//! events. No transport I/O.

pub mod authorization;
pub mod claims;
pub mod config;
pub mod events;
pub mod validator;
