//! # Shared Types Crate
//!
//! Cross-crate vocabulary for the secure bus:
//!
//! - **Error taxonomy** (`errors`): the two domain families
//!   (`EncryptionError`, `AuthenticationError`) plus the `BusError` surface
//!   every broker operation returns.
//! - **Envelope constants** (`envelope`): wire layout sizes, header names and
//!   the algorithm identifier stamped on encrypted messages.
//! - **Headers** (`headers`): the metadata map carried next to every message.
//!
//! ## Design Principles
//!
//! - Input-validation failures are never conflated with the domain families.
//! - Token validity is an outcome (`bool`), not an error.

pub mod envelope;
pub mod errors;
pub mod headers;

pub use envelope::*;
pub use errors::*;
pub use headers::MessageHeaders;
