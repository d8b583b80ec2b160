//! # Ports Layer
//!
//! - **Inbound (Driving)**: token validation and authorization used by the
//!   decorator; swappable for fakes through its constructor
//! - **Outbound (Driven)**: the audit sink

pub mod inbound;
pub mod outbound;
