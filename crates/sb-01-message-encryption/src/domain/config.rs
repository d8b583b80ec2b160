//! Encryption configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::AES256_GCM;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default rotation grace period: 24 hours.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Invalid encryption configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Current key version must not be empty")]
    MissingKeyVersion,

    #[error("No key configured for current version {0}")]
    MissingCurrentKey(String),

    #[error("Key version configured more than once: {0}")]
    DuplicateKeyVersion(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// One versioned key.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyVersionConfig {
    /// Version identifier.
    pub version: String,

    /// Base64-encoded 32-byte key.
    pub key: String,

    /// Activation time. Defaults to load time.
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for KeyVersionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVersionConfig")
            .field("version", &self.version)
            .field("key", &"**redacted**")
            .field("activated_at", &self.activated_at)
            .finish()
    }
}

/// Encryption settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Encrypt payloads. When false the decorator passes messages through.
    pub enabled: bool,

    /// Algorithm name. Only `AES256-GCM` is supported.
    pub algorithm: String,

    /// Version new messages are encrypted under.
    pub current_key_version: String,

    /// Known key versions, including the current one.
    pub keys: Vec<KeyVersionConfig>,

    /// How long a superseded version keeps decrypting.
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: AES256_GCM.to_string(),
            current_key_version: "v1".to_string(),
            keys: Vec::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl EncryptionConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SB_ENCRYPTION_ENABLED`: Encrypt payloads (default: true)
    /// - `SB_ENCRYPTION_ALGORITHM`: Algorithm name (default: AES256-GCM)
    /// - `SB_ENCRYPTION_KEY_VERSION`: Current key version (default: v1)
    /// - `SB_ENCRYPTION_KEY`: Base64 key for the current version
    /// - `SB_ENCRYPTION_PREVIOUS_KEYS`: `version:base64,...` still within grace
    /// - `SB_ENCRYPTION_GRACE_PERIOD`: Humantime duration (default: 24h)
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for malformed entries.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let enabled = env::var("SB_ENCRYPTION_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(defaults.enabled);

        let algorithm = env::var("SB_ENCRYPTION_ALGORITHM").unwrap_or(defaults.algorithm);
        let current_key_version =
            env::var("SB_ENCRYPTION_KEY_VERSION").unwrap_or(defaults.current_key_version);

        let mut keys = Vec::new();
        if let Ok(key) = env::var("SB_ENCRYPTION_KEY") {
            keys.push(KeyVersionConfig {
                version: current_key_version.clone(),
                key,
                activated_at: None,
            });
        }
        if let Ok(previous) = env::var("SB_ENCRYPTION_PREVIOUS_KEYS") {
            keys.extend(parse_previous_keys(&previous)?);
        }

        let grace_period = match env::var("SB_ENCRYPTION_GRACE_PERIOD") {
            Ok(v) => humantime_serde::re::humantime::parse_duration(&v).map_err(|e| {
                ConfigError::InvalidValue {
                    name: "SB_ENCRYPTION_GRACE_PERIOD".to_string(),
                    reason: e.to_string(),
                }
            })?,
            Err(_) => defaults.grace_period,
        };

        Ok(Self {
            enabled,
            algorithm,
            current_key_version,
            keys,
            grace_period,
        })
    }

    /// Check internal consistency.
    ///
    /// A disabled configuration is always valid.
    ///
    /// # Errors
    ///
    /// The first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if !self.algorithm.eq_ignore_ascii_case(AES256_GCM) {
            return Err(ConfigError::UnsupportedAlgorithm(self.algorithm.clone()));
        }
        if self.current_key_version.trim().is_empty() {
            return Err(ConfigError::MissingKeyVersion);
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.keys {
            if !seen.insert(entry.version.as_str()) {
                return Err(ConfigError::DuplicateKeyVersion(entry.version.clone()));
            }
        }
        if !seen.contains(self.current_key_version.as_str()) {
            return Err(ConfigError::MissingCurrentKey(
                self.current_key_version.clone(),
            ));
        }
        Ok(())
    }
}

fn parse_previous_keys(raw: &str) -> Result<Vec<KeyVersionConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (version, key) =
                entry
                    .split_once(':')
                    .ok_or_else(|| ConfigError::InvalidValue {
                        name: "SB_ENCRYPTION_PREVIOUS_KEYS".to_string(),
                        reason: "expected version:base64".to_string(),
                    })?;
            Ok(KeyVersionConfig {
                version: version.trim().to_string(),
                key: key.trim().to_string(),
                activated_at: None,
            })
        })
        .collect()
}
