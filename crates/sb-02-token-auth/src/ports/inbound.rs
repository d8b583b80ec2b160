//! # Inbound Ports (Driving Ports / API)
//!
//! Token checks are pure CPU work with no suspension points, so these traits
//! are synchronous. Only the four argument checks return errors; a bad token
//! is an `Ok(false)` outcome.

use crate::domain::claims::Claims;
use shared_types::BusError;

/// Verifies bearer tokens.
pub trait TokenAuthenticator: Send + Sync {
    /// Whether `token` is currently valid.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` for an empty or whitespace token.
    fn validate_token(&self, token: &str) -> Result<bool, BusError>;

    /// Claims of `token` if it is valid.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` for an empty or whitespace token.
    fn validated_claims(&self, token: &str) -> Result<Option<Claims>, BusError>;

    /// Release cached state. Default: nothing to release.
    fn dispose(&self) {}
}

/// Decides whether a token may perform an operation.
pub trait Authorizer: Send + Sync {
    /// Authorize `operation` on any topic. Only wildcard grants match.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` for an empty token or operation.
    fn authorize(&self, token: &str, operation: &str) -> Result<bool, BusError> {
        self.authorize_topic(token, operation, None)
    }

    /// Authorize `operation` on `topic`.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` for an empty token or operation.
    fn authorize_topic(
        &self,
        token: &str,
        operation: &str,
        topic: Option<&str>,
    ) -> Result<bool, BusError>;
}
