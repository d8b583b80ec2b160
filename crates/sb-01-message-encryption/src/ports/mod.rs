//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that the decorator and callers use
//! - **Outbound (Driven)**: Key material this subsystem needs

pub mod inbound;
pub mod outbound;
