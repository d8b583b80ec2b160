//! # Message Headers
//!
//! Out-of-band metadata travelling with a message. Lookups are
//! case-insensitive so `authorization` and `Authorization` resolve to the same
//! entry; insertion keeps the caller's spelling.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered header map with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHeaders(BTreeMap<String, String>);

impl MessageHeaders {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, returning the previous value.
    ///
    /// An existing entry with a differently-cased name is replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let previous = self.remove(&name);
        self.0.insert(name, value.into());
        previous
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a header by name, ignoring ASCII case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove a header by name, ignoring ASCII case.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = self
            .0
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .cloned()?;
        self.0.remove(&key)
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Merge `other` into `self`. Entries already present in `self` win.
    pub fn merge_missing(&mut self, other: &MessageHeaders) {
        for (name, value) in other.iter() {
            if !self.contains(name) {
                self.0.insert(name.to_string(), value.to_string());
            }
        }
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MessageHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let headers = MessageHeaders::new().with("Authorization", "Bearer abc");
        assert_eq!(headers.get("authorization"), Some("Bearer abc"));
        assert_eq!(headers.get("AUTHORIZATION"), Some("Bearer abc"));
        assert!(headers.get("X-Auth-Token").is_none());
    }

    #[test]
    fn test_insert_replaces_differently_cased_entry() {
        let mut headers = MessageHeaders::new().with("keyversion", "v1");
        let previous = headers.insert("KeyVersion", "v2");

        assert_eq!(previous.as_deref(), Some("v1"));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("KeyVersion"), Some("v2"));
    }

    #[test]
    fn test_merge_missing_keeps_existing_values() {
        let mut stamped = MessageHeaders::new().with("KeyVersion", "v2");
        let caller = MessageHeaders::new()
            .with("keyversion", "spoofed")
            .with("X-Correlation-Id", "42");

        stamped.merge_missing(&caller);

        assert_eq!(stamped.get("KeyVersion"), Some("v2"));
        assert_eq!(stamped.get("X-Correlation-Id"), Some("42"));
        assert_eq!(stamped.len(), 2);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let headers = MessageHeaders::new().with("A", "1");
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"{"A":"1"}"#);
    }
}
