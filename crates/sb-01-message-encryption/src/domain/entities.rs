//! # Domain Entities
//!
//! The wrapper published in place of the caller's message when encryption is
//! enabled. Created on publish, consumed on delivery, never persisted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shared_bus::BusMessage;

/// Encrypted payload plus the routing type of the original message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMessageWrapper {
    /// `nonce || ciphertext || tag`
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub encrypted_payload: Vec<u8>,

    /// `MESSAGE_TYPE` of the wrapped message.
    pub message_type: String,
}

impl BusMessage for EncryptedMessageWrapper {
    const MESSAGE_TYPE: &'static str = "secure-bus.encrypted-message";
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}
