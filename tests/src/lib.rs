//! # Secure-Bus Test Suite
//!
//! Unified test crate for behaviour that spans more than one subsystem.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared fixtures: keys, tokens, composed stacks
//! ├── integration/      # Both decorators stacked over the in-memory broker
//! └── exploits/         # Attack simulations against the composed stack
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p sb-tests
//!
//! # By category
//! cargo test -p sb-tests integration::
//! cargo test -p sb-tests exploits::
//!
//! # Benchmarks
//! cargo bench -p sb-tests
//! ```

pub mod exploits;
pub mod integration;
pub mod support;
