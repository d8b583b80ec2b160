//! # Claims Validator
//!
//! Verifies signed bearer tokens and caches the outcome.
//!
//! ## Checks
//!
//! 1. Header `alg` must be in the allow-list (`none` never parses)
//! 2. Signature against the configured symmetric or public key
//! 3. `iss`, `aud`, and `now < exp` with zero leeway
//!
//! ## Cache
//!
//! Outcomes, valid or not, are cached under the BLAKE3 fingerprint of the raw
//! token for the configured TTL. A valid entry never outlives the token's own
//! `exp`. Expired entries are ignored on read and overwritten; `prune_expired`
//! is available for caller-driven housekeeping.

use crate::domain::claims::Claims;
use crate::domain::config::{AuthenticationConfig, ConfigError};
use crate::ports::inbound::TokenAuthenticator;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use shared_crypto::{fingerprint, Fingerprint};
use shared_types::BusError;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    claims: Option<Claims>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Token validator with an outcome cache.
pub struct ClaimsValidator {
    issuer: String,
    audience: String,
    key: DecodingKey,
    algorithms: Vec<Algorithm>,
    cache_ttl: Duration,
    cache: DashMap<Fingerprint, CacheEntry>,
}

impl ClaimsValidator {
    /// Create a validator. Fails fast on incomplete configuration.
    ///
    /// # Errors
    ///
    /// Missing issuer, audience or key material; unusable key or algorithms.
    pub fn new(config: &AuthenticationConfig) -> Result<Self, ConfigError> {
        let key = config.decoding_key()?;
        let algorithms = config.algorithms()?;

        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            key,
            algorithms,
            cache_ttl: config.cache_ttl,
            cache: DashMap::new(),
        })
    }

    /// Accepted algorithms.
    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    /// Number of cached outcomes, expired or not.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let before = self.cache.len();
        let now = Instant::now();
        self.cache.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.cache.len())
    }

    fn lookup(&self, token: &str) -> Result<Option<Claims>, BusError> {
        if token.trim().is_empty() {
            return Err(BusError::empty_argument("token"));
        }

        let key = fingerprint(token.as_bytes());
        let now = Instant::now();

        if let Some(entry) = self.cache.get(&key) {
            if entry.is_live(now) {
                return Ok(entry.claims.clone());
            }
        }

        let claims = self.verify(token, key);

        let ttl = match &claims {
            Some(c) => {
                let remaining = (c.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                self.cache_ttl.min(remaining)
            }
            None => self.cache_ttl,
        };
        if !ttl.is_zero() {
            self.cache.insert(
                key,
                CacheEntry {
                    claims: claims.clone(),
                    expires_at: now.checked_add(ttl),
                },
            );
        }

        Ok(claims)
    }

    fn verify(&self, token: &str, key: Fingerprint) -> Option<Claims> {
        let header = match decode_header(token) {
            Ok(header) => header,
            Err(e) => {
                debug!(token = %key.short_hex(), error = %e, "Token header rejected");
                return None;
            }
        };

        if !self.algorithms.contains(&header.alg) {
            debug!(token = %key.short_hex(), alg = ?header.alg, "Token algorithm not allowed");
            return None;
        }

        let mut validation = Validation::new(header.alg);
        validation.algorithms = vec![header.alg];
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = match decode::<Map<String, Value>>(token, &self.key, &validation) {
            Ok(data) => data,
            Err(e) => {
                debug!(token = %key.short_hex(), error = %e, "Token rejected");
                return None;
            }
        };

        let claims = Claims::from_map(data.claims)?;
        if claims.expires_at <= Utc::now() {
            debug!(token = %key.short_hex(), "Token expired");
            return None;
        }

        debug!(
            token = %key.short_hex(),
            subject = claims.subject.as_deref().unwrap_or(""),
            "Token validated"
        );
        Some(claims)
    }
}

impl TokenAuthenticator for ClaimsValidator {
    fn validate_token(&self, token: &str) -> Result<bool, BusError> {
        Ok(self.lookup(token)?.is_some())
    }

    fn validated_claims(&self, token: &str) -> Result<Option<Claims>, BusError> {
        self.lookup(token)
    }

    fn dispose(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for ClaimsValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsValidator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithms", &self.algorithms)
            .field("cache_ttl", &self.cache_ttl)
            .field("cached", &self.cache.len())
            .finish()
    }
}
