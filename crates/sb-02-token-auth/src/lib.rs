//! # Token Authentication Subsystem (SB-02)
//!
//! Bearer-token authentication and role-based topic authorization for any
//! message broker.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): claims validator with outcome cache,
//!   authorization engine, configuration, audit events
//! - **Ports Layer** (`ports/`): `TokenAuthenticator` and `Authorizer`
//!   (inbound), `SecurityEventLogger` (outbound)
//! - **Adapters Layer** (`adapters/`): bearer header extraction, audit sinks,
//!   and the `SecurityBrokerDecorator`
//!
//! ## Security Notes
//!
//! - **Algorithms**: explicit allow-list, `none` is never accepted
//! - **Expiry**: zero clock-skew leeway
//! - **Fail Closed**: invalid tokens are denied even when `default_allow` is set
//! - **Audit**: every publish and delivery decision emits a `SecurityEvent`

pub mod adapters;
pub mod domain;
pub mod ports;

// Re-export public API
pub use adapters::audit::{RecordingSecurityEventLogger, TracingSecurityEventLogger};
pub use adapters::bearer::extract_bearer_token;
pub use adapters::decorator::SecurityBrokerDecorator;
pub use domain::authorization::{AuthorizationEngine, Operation, WILDCARD};
pub use domain::claims::Claims;
pub use domain::config::{
    AuthenticationConfig, AuthorizationConfig, ConfigError, PublicKeyConfig, PublicKeyKind,
};
pub use domain::events::{SecurityEvent, SecurityEventKind};
pub use domain::validator::ClaimsValidator;
pub use ports::inbound::{Authorizer, TokenAuthenticator};
pub use ports::outbound::SecurityEventLogger;
