//! # Token Forgery
//!
//! Attacker who can craft tokens, or rewrite headers on the transport,
//! tries to publish or get a delivery accepted.
//!
//! ## Attack Vectors
//!
//! - Unsigned token (`alg: none`)
//! - Token signed with a guessed secret, claiming `admin`
//! - Expired token, wrong issuer, wrong audience
//! - Captured wrapper replayed with a forged credential header

#[cfg(test)]
mod tests {
    use crate::support::{
        bearer, order, recv_within, token, Stack, AUDIENCE, ISSUER, ORDERS, SECRET,
    };
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use sb_02_token_auth::SecurityEventKind;
    use serde_json::{json, Value};
    use shared_bus::{CancellationToken, MessageBroker};
    use shared_types::{header_names, AuthenticationError, BusError};
    use std::time::Duration;

    fn admin_claims() -> Value {
        json!({
            "sub": "mallory",
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": Utc::now().timestamp() + 600,
            "roles": ["admin"],
        })
    }

    fn signed(claims: &Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn unsigned(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }

    async fn assert_publish_rejected(stack: &Stack, forged: &str) {
        let err = stack
            .bus
            .publish(order(), bearer(forged, ORDERS), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                BusError::Authentication(AuthenticationError::InvalidToken)
            ),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_forged_tokens_cannot_publish() {
        let stack = Stack::start(Duration::from_secs(3600)).await;

        let mut expired = admin_claims();
        expired["exp"] = json!(Utc::now().timestamp() - 1);
        let mut foreign_issuer = admin_claims();
        foreign_issuer["iss"] = json!("https://evil.example");
        let mut foreign_audience = admin_claims();
        foreign_audience["aud"] = json!("another-service");

        let forgeries = [
            unsigned(&admin_claims()),
            signed(&admin_claims(), "guessed-secret-guessed-secret-0000"),
            signed(&expired, SECRET),
            signed(&foreign_issuer, SECRET),
            signed(&foreign_audience, SECRET),
        ];
        for forged in &forgeries {
            assert_publish_rejected(&stack, forged).await;
        }

        assert_eq!(stack.broker.messages_published(), 0);
        assert_eq!(
            stack.audit.count(SecurityEventKind::Unauthorized),
            forgeries.len()
        );
    }

    #[tokio::test]
    async fn test_forged_credential_on_replayed_wrapper() {
        let stack = Stack::start(Duration::from_secs(3600)).await;

        // capture a legitimately published wrapper
        let (_tap, mut wire) = stack.tap_wire().await;
        let admin = token("svc-admin", &["admin"], 600);
        stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap();
        let (wrapper, mut headers, _topic) = recv_within(&mut wire, Duration::from_secs(2)).await;

        let (_sub, mut orders) = stack.collect_orders().await;
        headers.insert(header_names::AUTHORIZATION, format!("Bearer {}", unsigned(&admin_claims())));
        stack.inject(wrapper, headers, ORDERS).await;

        let reasons = stack.dead_letters(1).await;
        assert_eq!(reasons[0], "Invalid authentication token");
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_role_claim_cannot_be_escalated_without_key() {
        let stack = Stack::start(Duration::from_secs(3600)).await;

        // a genuine publisher token is refused on a topic it holds no grant for
        let publisher = token("svc-orders", &["publisher"], 600);
        let err = stack
            .bus
            .publish(order(), bearer(&publisher, "payments"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient permissions for publish");

        // rewriting its payload to claim admin breaks the signature
        let mut parts: Vec<String> = publisher.split('.').map(String::from).collect();
        let mut claims: Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(&parts[1]).unwrap()).unwrap();
        claims["roles"] = json!(["admin"]);
        parts[1] = URL_SAFE_NO_PAD.encode(claims.to_string());
        assert_publish_rejected(&stack, &parts.join(".")).await;
    }
}
