//! # Bus Messages
//!
//! Every message type carries a stable type name used for routing. Encoding
//! is JSON; the security layer treats the encoded bytes as opaque.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::BusError;

/// A message that can travel over the bus.
pub trait BusMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Routing name of this message type. Must be unique per bus.
    const MESSAGE_TYPE: &'static str;
}

/// Encode a message to bytes.
///
/// # Errors
///
/// Returns `BusError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, BusError> {
    serde_json::to_vec(message).map_err(|e| BusError::Serialization(e.to_string()))
}

/// Decode a message from bytes.
///
/// # Errors
///
/// Returns `BusError::Serialization` if the bytes are not a valid `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, BusError> {
    serde_json::from_slice(bytes).map_err(|e| BusError::Serialization(e.to_string()))
}
