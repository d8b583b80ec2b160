//! # Key Rotation Manager
//!
//! In-memory registry of key-version metadata.
//!
//! ## Invariants
//!
//! - Exactly one entry is active: the configured current version.
//! - The current version is always valid and never cleaned up.
//! - Any other version is valid while `now - activated_at <= grace_period`.
//!
//! Cleanup is caller-driven; there is no background timer.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared_types::BusError;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Metadata of one key version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVersionMetadata {
    /// Version identifier.
    pub version: String,
    /// When this version became active.
    pub activated_at: DateTime<Utc>,
    /// True only for the configured current version.
    pub is_active: bool,
}

#[derive(Debug)]
struct Registry {
    current_version: String,
    versions: HashMap<String, KeyVersionMetadata>,
}

/// Thread-safe registry of key versions and their validity.
#[derive(Debug)]
pub struct KeyRotationManager {
    registry: RwLock<Registry>,
    grace_period: Duration,
}

impl KeyRotationManager {
    /// Create a manager whose current version is registered as active now.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `current_version` is empty.
    pub fn new(current_version: &str, grace_period: Duration) -> Result<Self, BusError> {
        require_version(current_version)?;

        let mut versions = HashMap::new();
        versions.insert(
            current_version.to_string(),
            KeyVersionMetadata {
                version: current_version.to_string(),
                activated_at: Utc::now(),
                is_active: true,
            },
        );

        Ok(Self {
            registry: RwLock::new(Registry {
                current_version: current_version.to_string(),
                versions,
            }),
            grace_period,
        })
    }

    /// Configured grace period.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Configured current version.
    #[must_use]
    pub fn current_version(&self) -> String {
        self.registry.read().current_version.clone()
    }

    /// Insert or update a key version.
    ///
    /// The entry is marked active only if it is the current version.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `version` is empty.
    pub fn register_key_version(
        &self,
        version: &str,
        activated_at: DateTime<Utc>,
    ) -> Result<(), BusError> {
        require_version(version)?;

        let mut registry = self.registry.write();
        let is_active = registry.current_version == version;
        registry.versions.insert(
            version.to_string(),
            KeyVersionMetadata {
                version: version.to_string(),
                activated_at,
                is_active,
            },
        );

        debug!(version, %activated_at, is_active, "Key version registered");
        Ok(())
    }

    /// Make `version` the current version.
    ///
    /// The previous current version stays registered (inactive) so in-flight
    /// messages keep decrypting during the grace period. An unknown version is
    /// registered as activated now.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `version` is empty.
    pub fn rotate_to(&self, version: &str) -> Result<(), BusError> {
        require_version(version)?;

        let mut registry = self.registry.write();
        let previous = std::mem::replace(&mut registry.current_version, version.to_string());

        for metadata in registry.versions.values_mut() {
            metadata.is_active = metadata.version == version;
        }
        registry
            .versions
            .entry(version.to_string())
            .or_insert_with(|| KeyVersionMetadata {
                version: version.to_string(),
                activated_at: Utc::now(),
                is_active: true,
            });

        info!(from = %previous, to = version, "Key version rotated");
        Ok(())
    }

    /// Whether `version` may still be used to decrypt.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if `version` is empty.
    pub fn is_key_version_valid(&self, version: &str) -> Result<bool, BusError> {
        require_version(version)?;

        let registry = self.registry.read();
        if registry.current_version == version {
            return Ok(true);
        }

        let now = Utc::now();
        Ok(registry
            .versions
            .get(version)
            .is_some_and(|m| self.within_grace(m, now)))
    }

    /// Current version first, then other non-expired versions, most recently
    /// activated first.
    #[must_use]
    pub fn get_valid_key_versions(&self) -> Vec<String> {
        let registry = self.registry.read();
        let now = Utc::now();

        let mut others: Vec<&KeyVersionMetadata> = registry
            .versions
            .values()
            .filter(|m| m.version != registry.current_version && self.within_grace(m, now))
            .collect();
        others.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));

        std::iter::once(registry.current_version.clone())
            .chain(others.into_iter().map(|m| m.version.clone()))
            .collect()
    }

    /// Remove every non-current version whose grace period has elapsed.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired_key_versions(&self) -> usize {
        let mut registry = self.registry.write();
        let now = Utc::now();
        let current = registry.current_version.clone();
        let before = registry.versions.len();

        registry
            .versions
            .retain(|version, m| *version == current || self.within_grace(m, now));

        let removed = before - registry.versions.len();
        if removed > 0 {
            info!(removed, "Expired key versions cleaned up");
        }
        removed
    }

    /// Metadata for `version`, if registered.
    #[must_use]
    pub fn get_key_version_metadata(&self, version: &str) -> Option<KeyVersionMetadata> {
        self.registry.read().versions.get(version).cloned()
    }

    fn within_grace(&self, metadata: &KeyVersionMetadata, now: DateTime<Utc>) -> bool {
        // Future activation times count as zero age.
        let age = (now - metadata.activated_at).to_std().unwrap_or(Duration::ZERO);
        age <= self.grace_period
    }
}

fn require_version(version: &str) -> Result<(), BusError> {
    if version.trim().is_empty() {
        return Err(BusError::empty_argument("key version"));
    }
    Ok(())
}
