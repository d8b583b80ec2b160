//! # Composed Stack
//!
//! Security over encryption over the in-memory broker.
//!
//! ## Flow Tested
//!
//! 1. **Publish**: token checked on plaintext metadata, then payload sealed
//! 2. **Wire**: the transport only ever sees `EncryptedMessageWrapper`
//! 3. **Delivery**: payload opened, then the token re-checked for `subscribe`

#[cfg(test)]
mod tests {
    use crate::support::{bearer, order, recv_within, token, OrderPlaced, Stack, ORDERS};
    use sb_02_token_auth::SecurityEventKind;
    use shared_bus::{BusMessage, CancellationToken, MessageBroker, PublishOptions};
    use shared_types::{header_names, AuthenticationError, BusError, AES256_GCM};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);
    const GRACE: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_round_trip_through_both_decorators() {
        let stack = Stack::start(GRACE).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        let admin = token("svc-admin", &["admin"], 600);
        stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recv_within(&mut orders, WAIT).await, order());
        assert!(stack.broker.dead_letters().is_empty());
        assert_eq!(stack.audit.count(SecurityEventKind::Unauthorized), 0);
    }

    #[tokio::test]
    async fn test_wire_carries_only_the_wrapper_and_three_stamped_headers() {
        let stack = Stack::start(GRACE).await;
        let (_tap, mut wire) = stack.tap_wire().await;

        let admin = token("svc-admin", &["admin"], 600);
        stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap();

        let (wrapper, headers, topic) = recv_within(&mut wire, WAIT).await;
        assert_eq!(wrapper.message_type, OrderPlaced::MESSAGE_TYPE);
        assert_eq!(topic, ORDERS);

        // three stamped headers plus the caller's credential
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get(header_names::KEY_VERSION), Some("v1"));
        assert_eq!(headers.get(header_names::ALGORITHM), Some(AES256_GCM));
        assert!(headers.get(header_names::ENCRYPTED_AT).is_some());
        assert!(headers.contains(header_names::AUTHORIZATION));

        let leaked = String::from_utf8_lossy(&wrapper.encrypted_payload);
        assert!(!leaked.contains("cust-secret-identity"));
    }

    #[tokio::test]
    async fn test_publish_denial_precedes_encryption() {
        let stack = Stack::start(GRACE).await;

        let err = stack
            .bus
            .publish(order(), PublishOptions::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BusError::Authentication(AuthenticationError::TokenRequired)
        ));
        assert_eq!(stack.broker.messages_published(), 0);
    }

    #[tokio::test]
    async fn test_delivery_without_token_never_reaches_handler() {
        let stack = Stack::start(GRACE).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        // the encryption layer alone performs no access checks
        stack
            .bus
            .inner()
            .publish(order(), PublishOptions::new(), &CancellationToken::new())
            .await
            .unwrap();

        let reasons = stack.dead_letters(1).await;
        assert_eq!(reasons[0], "Authentication token required");
        assert!(orders.try_recv().is_err());
        assert_eq!(stack.audit.count(SecurityEventKind::Unauthorized), 1);
    }

    #[tokio::test]
    async fn test_publisher_token_without_subscribe_grant_is_dead_lettered() {
        let stack = Stack::start(GRACE).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        let publisher = token("svc-orders", &["publisher"], 600);
        stack
            .bus
            .publish(order(), bearer(&publisher, ORDERS), &CancellationToken::new())
            .await
            .unwrap();

        let reasons = stack.dead_letters(1).await;
        assert_eq!(reasons[0], "Insufficient permissions for subscribe");
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_token_holding_both_grants_delivers() {
        let stack = Stack::start(GRACE).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        let service = token("svc-orders", &["publisher", "reader"], 600);
        stack
            .bus
            .publish(order(), bearer(&service, ORDERS), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recv_within(&mut orders, WAIT).await, order());
        let subjects: Vec<_> = stack
            .audit
            .events()
            .into_iter()
            .filter_map(|e| e.subject)
            .collect();
        assert_eq!(subjects, vec!["svc-orders", "svc-orders"]);
    }

    #[tokio::test]
    async fn test_dispose_twice_releases_each_resource_once() {
        let stack = Stack::start(GRACE).await;

        stack.bus.dispose().await;
        stack.bus.dispose().await;

        assert_eq!(stack.provider.dispose_count(), 1);
        assert!(stack.broker.is_disposed());

        let admin = token("svc-admin", &["admin"], 600);
        let err = stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::Disposed));
    }

    #[tokio::test]
    async fn test_cancelled_publish_reaches_nothing() {
        let stack = Stack::start(GRACE).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let admin = token("svc-admin", &["admin"], 600);
        let err = stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, BusError::Cancelled));
        assert_eq!(stack.broker.messages_published(), 0);
    }
}
