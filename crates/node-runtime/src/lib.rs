//! # Node Runtime Library
//!
//! This library exposes the node's building blocks for testing.
//! The main entry point is the `secure-bus-node` binary.
//!
//! - `config`: environment-driven configuration for every section
//! - `logging`: tracing subscriber setup
//! - `runtime`: decorator composition and the heartbeat flow

pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{LoggingConfig, NodeConfig, NodeIdentity};
pub use runtime::{Heartbeat, NodeRuntime, SecureBus, HEARTBEAT_TOPIC};
