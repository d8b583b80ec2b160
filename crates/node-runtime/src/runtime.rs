//! # Node Runtime
//!
//! Composes the security stack and drives the heartbeat flow.
//!
//! ## Composition
//!
//! ```text
//! SecurityBrokerDecorator        authenticate + authorize + audit
//!   └─ EncryptionBrokerDecorator encrypt on publish, decrypt on delivery
//!        └─ InMemoryBroker       transport, dead-letter queue
//! ```
//!
//! Access checks run on plaintext metadata before any encryption work, and a
//! delivery is decrypted before its token is checked against the topic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use sb_01_message_encryption::{
    EncryptionBrokerDecorator, InMemoryKeyProvider, KeyRotationManager, MessageEncryptor,
    PayloadCipher,
};
use sb_02_token_auth::{
    AuthenticationConfig, AuthorizationEngine, Claims, ClaimsValidator, SecurityBrokerDecorator,
    TokenAuthenticator, TracingSecurityEventLogger,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_bus::{
    handler_fn, BusMessage, CancellationToken, DeliveryContext, InMemoryBroker, MessageBroker,
    PublishOptions, SubscribeOptions,
};
use shared_crypto::SecretKey;
use shared_types::{header_names, BusError, BEARER_PREFIX};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{NodeConfig, NodeIdentity};

/// Topic heartbeats are published on.
pub const HEARTBEAT_TOPIC: &str = "heartbeat";

/// Lifetime of a token minted by the node.
const MINTED_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// The fully decorated broker.
pub type SecureBus = SecurityBrokerDecorator<EncryptionBrokerDecorator<Arc<InMemoryBroker>>>;

/// Liveness message the node sends to itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub node: String,
    pub sequence: u64,
    pub sent_at: DateTime<Utc>,
}

impl BusMessage for Heartbeat {
    const MESSAGE_TYPE: &'static str = "secure-bus.heartbeat";
}

/// Stands in for the validator when authentication is switched off.
struct AuthenticationDisabled;

impl TokenAuthenticator for AuthenticationDisabled {
    fn validate_token(&self, _token: &str) -> Result<bool, BusError> {
        Ok(false)
    }

    fn validated_claims(&self, _token: &str) -> Result<Option<Claims>, BusError> {
        Ok(None)
    }
}

/// The running node.
pub struct NodeRuntime {
    broker: Arc<InMemoryBroker>,
    bus: SecureBus,
    token: Option<String>,
    node: String,
    sequence: AtomicU64,
    cancel: CancellationToken,
}

impl NodeRuntime {
    /// Build the decorated broker from configuration.
    ///
    /// ## Initialization Order
    ///
    /// 1. Validate configuration
    /// 2. Key provider, rotation manager, encryptor
    /// 3. Claims validator, authorization engine, audit sink
    /// 4. Node token (configured or minted)
    pub fn new(config: &NodeConfig) -> Result<Self> {
        config.validate()?;

        let broker = Arc::new(InMemoryBroker::new());
        let cipher = build_cipher(config)?;
        let encrypted =
            EncryptionBrokerDecorator::new(Arc::clone(&broker), cipher, config.encryption.enabled);

        let authenticator: Arc<dyn TokenAuthenticator> = if config.authentication.enabled {
            Arc::new(
                ClaimsValidator::new(&config.authentication)
                    .context("Failed to build claims validator")?,
            )
        } else {
            warn!("Authentication disabled, publishes and deliveries are not checked");
            Arc::new(AuthenticationDisabled)
        };
        let authorizer = Arc::new(AuthorizationEngine::new(
            Arc::clone(&authenticator),
            config.authorization.clone(),
        ));
        if config.authentication.enabled
            && config.authorization.publish_permissions.is_empty()
            && config.authorization.subscribe_permissions.is_empty()
            && !config.authorization.default_allow
        {
            warn!("No permissions configured and default_allow is false, every request will be denied");
        }

        let bus = SecurityBrokerDecorator::new(
            encrypted,
            authenticator,
            authorizer,
            Arc::new(TracingSecurityEventLogger::new()),
            config.authentication.enabled,
        );

        let token = if config.authentication.enabled {
            Some(node_token(&config.authentication, &config.identity)?)
        } else {
            None
        };

        Ok(Self {
            broker,
            bus,
            token,
            node: config.identity.subject.clone(),
            sequence: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// The decorated broker.
    pub fn bus(&self) -> &SecureBus {
        &self.bus
    }

    /// The underlying transport.
    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    /// Start the transport.
    pub async fn start(&self) -> Result<()> {
        self.bus
            .start(&self.cancel)
            .await
            .context("Failed to start broker")?;
        info!(
            encryption = self.bus.inner().is_enabled(),
            authentication = self.bus.is_enabled(),
            "Secure-Bus node started"
        );
        Ok(())
    }

    /// Publish one heartbeat and wait until it comes back through the stack.
    ///
    /// # Errors
    ///
    /// Publishing was refused, or nothing arrived within `wait`.
    pub async fn heartbeat(&self, wait: Duration) -> Result<Heartbeat> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = self
            .bus
            .subscribe(
                handler_fn(move |beat: Heartbeat, ctx: DeliveryContext| {
                    let tx = tx.clone();
                    async move {
                        info!(
                            message_id = %ctx.message_id,
                            sequence = beat.sequence,
                            node = %beat.node,
                            "Heartbeat received"
                        );
                        let _ = tx.send(beat);
                        Ok(())
                    }
                }),
                SubscribeOptions::new().with_topic(HEARTBEAT_TOPIC),
                &self.cancel,
            )
            .await
            .context("Failed to subscribe to heartbeats")?;

        let beat = Heartbeat {
            node: self.node.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            sent_at: Utc::now(),
        };

        let mut options = PublishOptions::new().with_topic(HEARTBEAT_TOPIC);
        if let Some(token) = &self.token {
            options = options.with_header(header_names::AUTHORIZATION, format!("{BEARER_PREFIX}{token}"));
        }
        self.bus
            .publish(beat.clone(), options, &self.cancel)
            .await
            .context("Failed to publish heartbeat")?;
        info!(sequence = beat.sequence, "Heartbeat published");

        let received = tokio::time::timeout(wait, rx.recv())
            .await
            .map_err(|_| anyhow!("No heartbeat delivered within {wait:?}"))?
            .ok_or_else(|| anyhow!("Heartbeat subscription closed"))?;
        Ok(received)
    }

    /// Stop the transport and release every owned resource.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.bus.stop(&self.cancel).await {
            warn!(error = %e, "Broker stop failed");
        }
        self.bus.dispose().await;
        self.cancel.cancel();
        info!(
            published = self.broker.messages_published(),
            delivered = self.broker.messages_delivered(),
            rejected = self.broker.messages_rejected(),
            "Shutdown complete"
        );
    }
}

fn build_cipher(config: &NodeConfig) -> Result<Arc<dyn PayloadCipher>> {
    let encryption = &config.encryption;
    if !encryption.enabled {
        // never used while the decorator is disabled
        let provider = InMemoryKeyProvider::new("unused", SecretKey::generate())?;
        return Ok(Arc::new(MessageEncryptor::new(Arc::new(provider))));
    }

    let provider = InMemoryKeyProvider::from_config(encryption)
        .context("Failed to load encryption keys")?;
    let rotation = KeyRotationManager::new(&encryption.current_key_version, encryption.grace_period)?;
    for entry in &encryption.keys {
        if let Some(activated_at) = provider.activated_at(&entry.version) {
            rotation.register_key_version(&entry.version, activated_at)?;
        }
    }

    info!(
        current = %encryption.current_key_version,
        versions = encryption.keys.len(),
        grace_period = ?encryption.grace_period,
        "Payload encryption enabled"
    );
    Ok(Arc::new(
        MessageEncryptor::new(Arc::new(provider)).with_rotation(Arc::new(rotation)),
    ))
}

/// The configured token, or one minted from the symmetric key.
fn node_token(auth: &AuthenticationConfig, identity: &NodeIdentity) -> Result<String> {
    if let Some(token) = &identity.token {
        return Ok(token.clone());
    }

    let secret = auth
        .symmetric_key
        .as_deref()
        .ok_or_else(|| anyhow!("SB_NODE_TOKEN is required without a symmetric key"))?;
    let algorithm = auth
        .algorithms()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No token algorithm available"))?;

    let expires_at = Utc::now() + chrono::Duration::from_std(MINTED_TOKEN_TTL)?;
    let claims = json!({
        "sub": identity.subject,
        "iss": auth.issuer,
        "aud": auth.audience,
        "iat": Utc::now().timestamp(),
        "exp": expires_at.timestamp(),
        "roles": [identity.role],
    });

    let token = encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to mint node token")?;
    info!(subject = %identity.subject, role = %identity.role, %expires_at, "Node token minted");
    Ok(token)
}
