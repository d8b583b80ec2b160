//! Authentication and authorization configuration.

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use shared_types::AuthenticationError;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default validation-cache TTL: 5 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Minimum HMAC secret length in bytes.
pub const MIN_SYMMETRIC_KEY_LEN: usize = 32;

/// Default claim carrying roles.
pub const DEFAULT_ROLE_CLAIM: &str = "roles";

/// Claim consulted when the configured role claim is absent.
pub const FALLBACK_ROLE_CLAIM: &str = "role";

/// Invalid authentication or authorization configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Issuer must not be empty")]
    MissingIssuer,

    #[error("Audience must not be empty")]
    MissingAudience,

    #[error("Either a symmetric key or a public key must be configured")]
    MissingKey,

    #[error("Configure a symmetric key or a public key, not both")]
    AmbiguousKey,

    #[error("Symmetric key must be at least {minimum} bytes, got {actual}")]
    WeakSymmetricKey { minimum: usize, actual: usize },

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Unknown signing algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Algorithm {algorithm} cannot be verified with a {key} key")]
    IncompatibleAlgorithm { algorithm: String, key: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl From<ConfigError> for AuthenticationError {
    fn from(e: ConfigError) -> Self {
        AuthenticationError::Configuration(e.to_string())
    }
}

/// Encoding of a verification-only public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublicKeyKind {
    /// RSA public key, PEM.
    RsaPem,
    /// EC public key, PEM.
    EcPem,
    /// Ed25519 public key, PEM.
    EdPem,
    /// Raw Ed25519 public key, base64url without padding.
    Ed25519,
}

impl PublicKeyKind {
    fn family(self) -> KeyFamily {
        match self {
            Self::RsaPem => KeyFamily::Rsa,
            Self::EcPem => KeyFamily::Ec,
            Self::EdPem | Self::Ed25519 => KeyFamily::Ed,
        }
    }
}

/// Public key for signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyConfig {
    pub kind: PublicKeyKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Self::Hmac,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Self::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => Self::Ec,
            Algorithm::EdDSA => Self::Ed,
        }
    }

    fn defaults(self) -> Vec<Algorithm> {
        match self {
            Self::Hmac => vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            Self::Rsa => vec![
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            Self::Ec => vec![Algorithm::ES256, Algorithm::ES384],
            Self::Ed => vec![Algorithm::EdDSA],
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Hmac => "symmetric",
            Self::Rsa => "RSA",
            Self::Ec => "EC",
            Self::Ed => "Ed25519",
        }
    }
}

/// Token authentication settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthenticationConfig {
    /// Require a valid bearer token. When false the decorator passes through.
    pub enabled: bool,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// HMAC secret (UTF-8).
    pub symmetric_key: Option<String>,

    /// Verification key for asymmetric algorithms.
    pub public_key: Option<PublicKeyConfig>,

    /// Accepted `alg` values. Empty means every algorithm of the key's family.
    pub allowed_algorithms: Vec<String>,

    /// How long a validation outcome is reused.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            issuer: String::new(),
            audience: String::new(),
            symmetric_key: None,
            public_key: None,
            allowed_algorithms: Vec::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl std::fmt::Debug for AuthenticationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationConfig")
            .field("enabled", &self.enabled)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("symmetric_key", &self.symmetric_key.as_ref().map(|_| "**redacted**"))
            .field("public_key", &self.public_key.as_ref().map(|k| k.kind))
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl AuthenticationConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SB_AUTH_ENABLED`: Require tokens (default: true)
    /// - `SB_AUTH_ISSUER`, `SB_AUTH_AUDIENCE`: Expected claims
    /// - `SB_AUTH_SYMMETRIC_KEY`: HMAC secret
    /// - `SB_AUTH_PUBLIC_KEY_KIND` + `SB_AUTH_PUBLIC_KEY`: Verification key
    /// - `SB_AUTH_ALGORITHMS`: Comma-separated allow-list
    /// - `SB_AUTH_CACHE_TTL`: Humantime duration (default: 5m)
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for malformed entries.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let public_key = match env::var("SB_AUTH_PUBLIC_KEY") {
            Ok(value) => {
                let kind = env::var("SB_AUTH_PUBLIC_KEY_KIND").unwrap_or_else(|_| "rsa-pem".into());
                let kind = serde_json::from_value(serde_json::Value::String(kind.clone()))
                    .map_err(|_| ConfigError::InvalidValue {
                        name: "SB_AUTH_PUBLIC_KEY_KIND".into(),
                        reason: format!("unknown key kind {kind}"),
                    })?;
                Some(PublicKeyConfig { kind, value })
            }
            Err(_) => None,
        };

        let cache_ttl = match env::var("SB_AUTH_CACHE_TTL") {
            Ok(v) => humantime_serde::re::humantime::parse_duration(&v).map_err(|e| {
                ConfigError::InvalidValue {
                    name: "SB_AUTH_CACHE_TTL".into(),
                    reason: e.to_string(),
                }
            })?,
            Err(_) => defaults.cache_ttl,
        };

        Ok(Self {
            enabled: env::var("SB_AUTH_ENABLED")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.enabled),
            issuer: env::var("SB_AUTH_ISSUER").unwrap_or_default(),
            audience: env::var("SB_AUTH_AUDIENCE").unwrap_or_default(),
            symmetric_key: env::var("SB_AUTH_SYMMETRIC_KEY").ok(),
            public_key,
            allowed_algorithms: env::var("SB_AUTH_ALGORITHMS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            cache_ttl,
        })
    }

    /// Check the configuration and that the key material parses.
    ///
    /// # Errors
    ///
    /// The first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoding_key()?;
        self.algorithms()?;
        Ok(())
    }

    fn family(&self) -> Result<KeyFamily, ConfigError> {
        match (&self.symmetric_key, &self.public_key) {
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousKey),
            (Some(_), None) => Ok(KeyFamily::Hmac),
            (None, Some(pk)) => Ok(pk.kind.family()),
            (None, None) => Err(ConfigError::MissingKey),
        }
    }

    /// Build the verification key.
    ///
    /// # Errors
    ///
    /// Missing claims, missing or ambiguous key, weak secret, unparsable key.
    pub fn decoding_key(&self) -> Result<DecodingKey, ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingIssuer);
        }
        if self.audience.trim().is_empty() {
            return Err(ConfigError::MissingAudience);
        }
        self.family()?;

        if let Some(secret) = &self.symmetric_key {
            if secret.len() < MIN_SYMMETRIC_KEY_LEN {
                return Err(ConfigError::WeakSymmetricKey {
                    minimum: MIN_SYMMETRIC_KEY_LEN,
                    actual: secret.len(),
                });
            }
            return Ok(DecodingKey::from_secret(secret.as_bytes()));
        }

        let Some(pk) = &self.public_key else {
            return Err(ConfigError::MissingKey);
        };
        let pem = pk.value.as_bytes();
        let key = match pk.kind {
            PublicKeyKind::RsaPem => DecodingKey::from_rsa_pem(pem),
            PublicKeyKind::EcPem => DecodingKey::from_ec_pem(pem),
            PublicKeyKind::EdPem => DecodingKey::from_ed_pem(pem),
            PublicKeyKind::Ed25519 => DecodingKey::from_ed_components(pk.value.trim()),
        };
        key.map_err(|e| ConfigError::InvalidPublicKey(e.to_string()))
    }

    /// Resolve the algorithm allow-list.
    ///
    /// # Errors
    ///
    /// Unknown names, or algorithms the configured key cannot verify.
    pub fn algorithms(&self) -> Result<Vec<Algorithm>, ConfigError> {
        let family = self.family()?;
        if self.allowed_algorithms.is_empty() {
            return Ok(family.defaults());
        }

        self.allowed_algorithms
            .iter()
            .map(|name| {
                let algorithm = Algorithm::from_str(name.trim())
                    .map_err(|_| ConfigError::UnknownAlgorithm(name.clone()))?;
                if KeyFamily::of(algorithm) != family {
                    return Err(ConfigError::IncompatibleAlgorithm {
                        algorithm: name.clone(),
                        key: family.name().to_string(),
                    });
                }
                Ok(algorithm)
            })
            .collect()
    }
}

/// Role-based authorization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Outcome when the token has no roles or no table covers the operation.
    pub default_allow: bool,

    /// Claim holding the caller's roles.
    pub role_claim: String,

    /// `role → [topic | "*"]` for publishing.
    pub publish_permissions: HashMap<String, Vec<String>>,

    /// `role → [topic | "*"]` for subscribing.
    pub subscribe_permissions: HashMap<String, Vec<String>>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            default_allow: false,
            role_claim: DEFAULT_ROLE_CLAIM.to_string(),
            publish_permissions: HashMap::new(),
            subscribe_permissions: HashMap::new(),
        }
    }
}

impl AuthorizationConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SB_AUTHZ_DEFAULT_ALLOW`: Fallback outcome (default: false)
    /// - `SB_AUTHZ_ROLE_CLAIM`: Role claim name (default: roles)
    /// - `SB_AUTHZ_PUBLISH`, `SB_AUTHZ_SUBSCRIBE`: `role=topic|topic;role=*`
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for malformed permission tables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            default_allow: env::var("SB_AUTHZ_DEFAULT_ALLOW")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.default_allow),
            role_claim: env::var("SB_AUTHZ_ROLE_CLAIM").unwrap_or(defaults.role_claim),
            publish_permissions: match env::var("SB_AUTHZ_PUBLISH") {
                Ok(v) => parse_permissions("SB_AUTHZ_PUBLISH", &v)?,
                Err(_) => HashMap::new(),
            },
            subscribe_permissions: match env::var("SB_AUTHZ_SUBSCRIBE") {
                Ok(v) => parse_permissions("SB_AUTHZ_SUBSCRIBE", &v)?,
                Err(_) => HashMap::new(),
            },
        })
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` for an empty role claim or empty role names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.role_claim.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "role_claim".into(),
                reason: "must not be empty".into(),
            });
        }
        let tables = [
            ("publish_permissions", &self.publish_permissions),
            ("subscribe_permissions", &self.subscribe_permissions),
        ];
        for (name, table) in tables {
            if table.keys().any(|role| role.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    name: name.into(),
                    reason: "role names must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

fn parse_permissions(name: &str, raw: &str) -> Result<HashMap<String, Vec<String>>, ConfigError> {
    let mut table = HashMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (role, topics) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected role=topics, got {entry}"),
        })?;
        let topics = topics
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        table.insert(role.trim().to_string(), topics);
    }
    Ok(table)
}
