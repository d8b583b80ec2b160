//! # In-Memory Key Provider
//!
//! Holds versioned keys in process memory. Keys are zeroized when replaced,
//! removed, or when the provider is disposed.

use crate::domain::config::EncryptionConfig;
use crate::ports::outbound::KeyProvider;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared_crypto::SecretKey;
use shared_types::{BusError, EncryptionError, KEY_SIZE};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct StoredKey {
    key: SecretKey,
    activated_at: DateTime<Utc>,
}

struct KeyStore {
    current_version: String,
    keys: HashMap<String, StoredKey>,
}

/// Versioned key map.
pub struct InMemoryKeyProvider {
    store: RwLock<KeyStore>,
    dispose_count: AtomicUsize,
}

impl InMemoryKeyProvider {
    /// Provider holding a single key as the current version.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `version` is empty.
    pub fn new(version: &str, key: SecretKey) -> Result<Self, BusError> {
        if version.trim().is_empty() {
            return Err(BusError::empty_argument("key version"));
        }

        let mut keys = HashMap::new();
        keys.insert(
            version.to_string(),
            StoredKey {
                key,
                activated_at: Utc::now(),
            },
        );

        Ok(Self {
            store: RwLock::new(KeyStore {
                current_version: version.to_string(),
                keys,
            }),
            dispose_count: AtomicUsize::new(0),
        })
    }

    /// Build from configuration, decoding every base64 key.
    ///
    /// # Errors
    ///
    /// - `EncryptionError::InvalidKeyEncoding` for malformed base64
    /// - `EncryptionError::InvalidKeySize` for keys that are not 32 bytes
    /// - `EncryptionError::KeyNotFound` if the current version has no key
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, EncryptionError> {
        let now = Utc::now();
        let mut keys = HashMap::with_capacity(config.keys.len());

        for entry in &config.keys {
            let key = decode_key(&entry.version, &entry.key)?;
            keys.insert(
                entry.version.clone(),
                StoredKey {
                    key,
                    activated_at: entry.activated_at.unwrap_or(now),
                },
            );
        }

        if !keys.contains_key(&config.current_key_version) {
            return Err(EncryptionError::KeyNotFound(
                config.current_key_version.clone(),
            ));
        }

        info!(
            current = %config.current_key_version,
            versions = keys.len(),
            "Key provider loaded"
        );

        Ok(Self {
            store: RwLock::new(KeyStore {
                current_version: config.current_key_version.clone(),
                keys,
            }),
            dispose_count: AtomicUsize::new(0),
        })
    }

    /// Add a key version (builder form).
    #[must_use]
    pub fn with_key(self, version: &str, key: SecretKey, activated_at: DateTime<Utc>) -> Self {
        self.insert_key(version, key, activated_at);
        self
    }

    /// Add or replace a key version.
    pub fn insert_key(&self, version: &str, key: SecretKey, activated_at: DateTime<Utc>) {
        self.store
            .write()
            .keys
            .insert(version.to_string(), StoredKey { key, activated_at });
        debug!(version, "Key version stored");
    }

    /// Switch the current version.
    ///
    /// # Errors
    ///
    /// `EncryptionError::KeyNotFound` if no key is stored under `version`.
    pub fn set_current(&self, version: &str) -> Result<(), EncryptionError> {
        let mut store = self.store.write();
        if !store.keys.contains_key(version) {
            return Err(EncryptionError::KeyNotFound(version.to_string()));
        }
        store.current_version = version.to_string();
        info!(version, "Current key version changed");
        Ok(())
    }

    /// Activation time of `version`.
    pub fn activated_at(&self, version: &str) -> Option<DateTime<Utc>> {
        self.store.read().keys.get(version).map(|k| k.activated_at)
    }

    /// Number of times `dispose` actually released keys.
    pub fn dispose_count(&self) -> usize {
        self.dispose_count.load(Ordering::SeqCst)
    }
}

/// Decode a base64 key and check its length.
///
/// # Errors
///
/// `InvalidKeyEncoding` or `InvalidKeySize`.
pub fn decode_key(version: &str, encoded: &str) -> Result<SecretKey, EncryptionError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| EncryptionError::InvalidKeyEncoding {
            version: version.to_string(),
            reason: e.to_string(),
        })?;

    SecretKey::from_slice(&bytes).map_err(|_| EncryptionError::InvalidKeySize {
        version: version.to_string(),
        expected: KEY_SIZE,
        actual: bytes.len(),
    })
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    fn current_key_version(&self) -> String {
        self.store.read().current_version.clone()
    }

    async fn get_key(
        &self,
        version: &str,
        _cancel: &CancellationToken,
    ) -> Result<SecretKey, EncryptionError> {
        self.store
            .read()
            .keys
            .get(version)
            .map(|k| k.key.clone())
            .ok_or_else(|| EncryptionError::KeyNotFound(version.to_string()))
    }

    async fn get_previous_key_versions(
        &self,
        grace_period: Duration,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>, EncryptionError> {
        let store = self.store.read();
        let now = Utc::now();

        let mut previous: Vec<(&String, DateTime<Utc>)> = store
            .keys
            .iter()
            .filter(|(version, k)| {
                **version != store.current_version
                    && (now - k.activated_at).to_std().unwrap_or(Duration::ZERO) <= grace_period
            })
            .map(|(version, k)| (version, k.activated_at))
            .collect();
        previous.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(previous.into_iter().map(|(v, _)| v.clone()).collect())
    }

    async fn dispose(&self) {
        let mut store = self.store.write();
        if store.keys.is_empty() {
            return;
        }
        // Dropping each SecretKey zeroizes it.
        store.keys.clear();
        self.dispose_count.fetch_add(1, Ordering::SeqCst);
        debug!("Key provider disposed");
    }
}

impl std::fmt::Debug for InMemoryKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.read();
        f.debug_struct("InMemoryKeyProvider")
            .field("current_version", &store.current_version)
            .field("versions", &store.keys.len())
            .finish()
    }
}
