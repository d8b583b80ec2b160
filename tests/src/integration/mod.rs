//! Cross-subsystem behaviour of the composed stack.

pub mod composition;
pub mod key_rotation;
