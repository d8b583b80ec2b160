//! # Adapters Layer
//!
//! - `audit`: `SecurityEventLogger` implementations
//! - `bearer`: token extraction from message headers
//! - `decorator`: `MessageBroker` decorator enforcing authentication and
//!   authorization

pub mod audit;
pub mod bearer;
pub mod decorator;
