//! # Test Fixtures
//!
//! Keys, tokens, and the fully composed stack shared by the integration
//! tests, the attack simulations, and the benchmarks.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sb_01_message_encryption::{
    EncryptedMessageWrapper, EncryptionBrokerDecorator, InMemoryKeyProvider, KeyRotationManager,
    MessageEncryptor,
};
use sb_02_token_auth::{
    AuthenticationConfig, AuthorizationConfig, AuthorizationEngine, ClaimsValidator,
    RecordingSecurityEventLogger, SecurityBrokerDecorator, TokenAuthenticator,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_bus::{
    handler_fn, BusMessage, CancellationToken, DeliveryContext, InMemoryBroker, MessageBroker,
    PublishOptions, SubscribeOptions, Subscription,
};
use shared_crypto::SecretKey;
use shared_types::{header_names, BusError, MessageHeaders, BEARER_PREFIX};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const SECRET: &str = "sb-tests-shared-secret-32-bytes-min";
pub const ISSUER: &str = "https://auth.sb-tests.local";
pub const AUDIENCE: &str = "secure-bus";
pub const ORDERS: &str = "orders";

/// Message used throughout the suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: String,
    pub customer: String,
    pub total_cents: u64,
}

impl BusMessage for OrderPlaced {
    const MESSAGE_TYPE: &'static str = "order.placed";
}

pub fn order() -> OrderPlaced {
    OrderPlaced {
        order_id: "ord-1001".into(),
        customer: "cust-secret-identity".into(),
        total_cents: 12_345,
    }
}

/// HS256 token for `subject` holding `roles`, expiring `exp_offset` seconds from now.
pub fn token(subject: &str, roles: &[&str], exp_offset: i64) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": subject,
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": Utc::now().timestamp() + exp_offset,
            "roles": roles,
        }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token encodes")
}

/// Publish options carrying `token` as a bearer credential on `topic`.
pub fn bearer(token: &str, topic: &str) -> PublishOptions {
    PublishOptions::new()
        .with_topic(topic)
        .with_header(header_names::AUTHORIZATION, format!("{BEARER_PREFIX}{token}"))
}

pub fn auth_config() -> AuthenticationConfig {
    AuthenticationConfig {
        issuer: ISSUER.into(),
        audience: AUDIENCE.into(),
        symmetric_key: Some(SECRET.into()),
        ..Default::default()
    }
}

/// `admin` may do anything; `publisher` may publish orders; `reader` may subscribe to orders.
pub fn authz_config() -> AuthorizationConfig {
    AuthorizationConfig {
        publish_permissions: HashMap::from([
            ("admin".into(), vec!["*".into()]),
            ("publisher".into(), vec![ORDERS.into()]),
        ]),
        subscribe_permissions: HashMap::from([
            ("admin".into(), vec!["*".into()]),
            ("reader".into(), vec![ORDERS.into()]),
        ]),
        ..Default::default()
    }
}

pub type Bus = SecurityBrokerDecorator<EncryptionBrokerDecorator<Arc<InMemoryBroker>>>;

/// Security over encryption over the in-memory broker, with handles on every layer.
pub struct Stack {
    pub broker: Arc<InMemoryBroker>,
    pub provider: Arc<InMemoryKeyProvider>,
    pub rotation: Arc<KeyRotationManager>,
    pub audit: Arc<RecordingSecurityEventLogger>,
    pub bus: Bus,
}

impl Stack {
    /// Build and start a stack whose current key is `v1`.
    pub async fn start(grace_period: Duration) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        broker
            .start(&CancellationToken::new())
            .await
            .expect("broker starts");

        let provider = Arc::new(
            InMemoryKeyProvider::new("v1", SecretKey::generate()).expect("provider builds"),
        );
        let rotation =
            Arc::new(KeyRotationManager::new("v1", grace_period).expect("rotation builds"));
        let encryptor =
            MessageEncryptor::new(provider.clone()).with_rotation(Arc::clone(&rotation));
        let encrypted =
            EncryptionBrokerDecorator::new(Arc::clone(&broker), Arc::new(encryptor), true);

        let validator: Arc<dyn TokenAuthenticator> =
            Arc::new(ClaimsValidator::new(&auth_config()).expect("validator builds"));
        let engine = Arc::new(AuthorizationEngine::new(
            Arc::clone(&validator),
            authz_config(),
        ));
        let audit = Arc::new(RecordingSecurityEventLogger::new());
        let bus = SecurityBrokerDecorator::new(encrypted, validator, engine, audit.clone(), true);

        Self {
            broker,
            provider,
            rotation,
            audit,
            bus,
        }
    }

    /// Make `version` current in both the provider and the rotation registry.
    pub fn rotate_to(&self, version: &str) {
        self.provider
            .insert_key(version, SecretKey::generate(), Utc::now());
        self.provider.set_current(version).expect("version known");
        self.rotation.rotate_to(version).expect("version valid");
    }

    /// Subscribe through the full stack, forwarding every delivered order.
    pub async fn collect_orders(&self) -> (Subscription, mpsc::UnboundedReceiver<OrderPlaced>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self
            .bus
            .subscribe(
                handler_fn(move |o: OrderPlaced, _ctx: DeliveryContext| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(o);
                        Ok::<(), BusError>(())
                    }
                }),
                SubscribeOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .expect("subscribes");
        (subscription, rx)
    }

    /// Subscribe to the raw transport, capturing wrappers and their headers.
    pub async fn tap_wire(
        &self,
    ) -> (
        Subscription,
        mpsc::UnboundedReceiver<(EncryptedMessageWrapper, MessageHeaders, String)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self
            .broker
            .subscribe(
                handler_fn(move |w: EncryptedMessageWrapper, ctx: DeliveryContext| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send((w, ctx.headers, ctx.topic));
                        Ok::<(), BusError>(())
                    }
                }),
                SubscribeOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .expect("subscribes");
        (subscription, rx)
    }

    /// Publish a wrapper straight onto the transport, bypassing both decorators.
    pub async fn inject(
        &self,
        wrapper: EncryptedMessageWrapper,
        headers: MessageHeaders,
        topic: &str,
    ) {
        let options = PublishOptions {
            topic: Some(topic.to_string()),
            headers,
            message_id: None,
        };
        self.broker
            .publish(wrapper, options, &CancellationToken::new())
            .await
            .expect("raw publish");
    }

    /// Wait until the transport holds `count` dead letters.
    pub async fn dead_letters(&self, count: usize) -> Vec<String> {
        let broker = Arc::clone(&self.broker);
        eventually(Duration::from_secs(2), move || {
            let broker = Arc::clone(&broker);
            async move { broker.dead_letters().len() >= count }
        })
        .await;
        self.broker
            .dead_letters()
            .into_iter()
            .map(|d| d.reason)
            .collect()
    }
}

/// Poll `check` until it holds or `within` elapses. Panics on timeout.
pub async fn eventually<F, Fut>(within: Duration, check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(within, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

/// Receive one item or panic after `within`.
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>, within: Duration) -> T {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("delivered in time")
        .expect("channel open")
}
