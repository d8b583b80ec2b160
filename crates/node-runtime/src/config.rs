//! # Node Configuration
//!
//! Unified configuration for the node: logging, the three security sections,
//! and the identity the node publishes its heartbeat under.
//!
//! ## Security Requirements
//!
//! - With authentication enabled, the node needs either `SB_NODE_TOKEN` or a
//!   symmetric key to mint its own token
//! - Secrets are redacted from `Debug` output

use anyhow::{bail, Context, Result};
use sb_01_message_encryption::EncryptionConfig;
use sb_02_token_auth::{AuthenticationConfig, AuthorizationConfig};
use std::env;
use std::time::Duration;

/// Complete node configuration.
#[derive(Clone)]
pub struct NodeConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Payload encryption.
    pub encryption: EncryptionConfig,
    /// Token authentication.
    pub authentication: AuthenticationConfig,
    /// Role-based authorization.
    pub authorization: AuthorizationConfig,
    /// Identity the node publishes under.
    pub identity: NodeIdentity,
    /// How long to wait for the heartbeat to come back.
    pub heartbeat_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            encryption: EncryptionConfig::default(),
            authentication: AuthenticationConfig::default(),
            authorization: AuthorizationConfig::default(),
            identity: NodeIdentity::default(),
            heartbeat_timeout: Duration::from_secs(5),
        }
    }
}

impl NodeConfig {
    /// Load every section from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Section variables are documented on each section's `from_env`. The
    /// node itself reads:
    ///
    /// - `SB_NODE_TOKEN`: Pre-issued bearer token
    /// - `SB_NODE_SUBJECT`: Subject of a minted token (default: secure-bus-node)
    /// - `SB_NODE_ROLE`: Role of a minted token (default: admin)
    /// - `SB_HEARTBEAT_TIMEOUT`: Humantime duration (default: 5s)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let heartbeat_timeout = match env::var("SB_HEARTBEAT_TIMEOUT") {
            Ok(v) => humantime_serde::re::humantime::parse_duration(&v)
                .with_context(|| format!("SB_HEARTBEAT_TIMEOUT: invalid duration {v:?}"))?,
            Err(_) => defaults.heartbeat_timeout,
        };

        Ok(Self {
            logging: LoggingConfig::from_env(),
            encryption: EncryptionConfig::from_env()
                .context("Failed to load encryption configuration")?,
            authentication: AuthenticationConfig::from_env()
                .context("Failed to load authentication configuration")?,
            authorization: AuthorizationConfig::from_env()
                .context("Failed to load authorization configuration")?,
            identity: NodeIdentity::from_env(),
            heartbeat_timeout,
        })
    }

    /// Validate every enabled section.
    ///
    /// # Errors
    ///
    /// The first section that fails validation, or an enabled authentication
    /// section with no way for the node to obtain a token.
    pub fn validate(&self) -> Result<()> {
        self.encryption
            .validate()
            .context("Invalid encryption configuration")?;
        if self.authentication.enabled {
            self.authentication
                .validate()
                .context("Invalid authentication configuration")?;
            if self.identity.token.is_none() && self.authentication.symmetric_key.is_none() {
                bail!("SB_NODE_TOKEN is required when tokens are verified with a public key");
            }
        }
        self.authorization
            .validate()
            .context("Invalid authorization configuration")?;
        Ok(())
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("logging", &self.logging)
            .field("encryption", &self.encryption)
            .field("authentication", &self.authentication)
            .field("authorization", &self.authorization)
            .field("identity", &self.identity)
            .field("heartbeat_timeout", &self.heartbeat_timeout)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl LoggingConfig {
    /// - `SB_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `SB_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("SB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: env::var("SB_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Who the node is when it publishes.
#[derive(Clone)]
pub struct NodeIdentity {
    /// Pre-issued token. When absent a token is minted from the symmetric key.
    pub token: Option<String>,
    pub subject: String,
    pub role: String,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            token: None,
            subject: "secure-bus-node".to_string(),
            role: "admin".to_string(),
        }
    }
}

impl NodeIdentity {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token: env::var("SB_NODE_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            subject: env::var("SB_NODE_SUBJECT").unwrap_or(defaults.subject),
            role: env::var("SB_NODE_ROLE").unwrap_or(defaults.role),
        }
    }
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("subject", &self.subject)
            .field("role", &self.role)
            .finish()
    }
}
