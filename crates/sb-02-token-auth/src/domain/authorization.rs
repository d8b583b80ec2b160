//! # Authorization Engine
//!
//! Maps token roles and an operation to an allow/deny decision.
//!
//! ## Decision Order
//!
//! 1. Invalid token: deny, permissions are not consulted
//! 2. No roles in the token: `default_allow`
//! 3. Unrecognised operation: deny
//! 4. No permission table for the operation: `default_allow`
//! 5. Any role granting `*` or the requested topic: allow
//! 6. No role appears in the table: `default_allow`; otherwise deny

use crate::domain::config::{AuthorizationConfig, FALLBACK_ROLE_CLAIM};
use crate::ports::inbound::{Authorizer, TokenAuthenticator};
use shared_types::BusError;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Wildcard grant.
pub const WILDCARD: &str = "*";

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Publish,
    Subscribe,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "publish" => Ok(Self::Publish),
            "subscribe" => Ok(Self::Subscribe),
            _ => Err(()),
        }
    }
}

/// Role-based authorizer over a [`TokenAuthenticator`].
pub struct AuthorizationEngine {
    authenticator: Arc<dyn TokenAuthenticator>,
    config: AuthorizationConfig,
}

impl AuthorizationEngine {
    pub fn new(authenticator: Arc<dyn TokenAuthenticator>, config: AuthorizationConfig) -> Self {
        Self {
            authenticator,
            config,
        }
    }

    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }

    fn table(&self, operation: Operation) -> &HashMap<String, Vec<String>> {
        match operation {
            Operation::Publish => &self.config.publish_permissions,
            Operation::Subscribe => &self.config.subscribe_permissions,
        }
    }
}

impl Authorizer for AuthorizationEngine {
    fn authorize_topic(
        &self,
        token: &str,
        operation: &str,
        topic: Option<&str>,
    ) -> Result<bool, BusError> {
        if token.trim().is_empty() {
            return Err(BusError::empty_argument("token"));
        }
        if operation.trim().is_empty() {
            return Err(BusError::empty_argument("operation"));
        }

        let Some(claims) = self.authenticator.validated_claims(token)? else {
            return Ok(false);
        };

        let claim = if claims.contains(&self.config.role_claim) {
            self.config.role_claim.as_str()
        } else {
            FALLBACK_ROLE_CLAIM
        };
        let roles = claims.roles(claim);
        if roles.is_empty() {
            debug!(operation, default_allow = self.config.default_allow, "Token carries no roles");
            return Ok(self.config.default_allow);
        }

        let Ok(operation) = operation.parse::<Operation>() else {
            debug!(operation, "Unrecognised operation");
            return Ok(false);
        };

        let table = self.table(operation);
        if table.is_empty() {
            return Ok(self.config.default_allow);
        }

        let mut any_role_configured = false;
        for role in &roles {
            let Some(grants) = table.get(role) else {
                continue;
            };
            any_role_configured = true;
            let allowed = grants
                .iter()
                .any(|g| g == WILDCARD || topic.is_some_and(|t| g == t));
            if allowed {
                debug!(%operation, role = %role, topic = topic.unwrap_or(""), "Authorized");
                return Ok(true);
            }
        }

        if !any_role_configured {
            return Ok(self.config.default_allow);
        }
        debug!(%operation, ?roles, topic = topic.unwrap_or(""), "No role grants access");
        Ok(false)
    }
}

impl fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("config", &self.config)
            .finish()
    }
}
