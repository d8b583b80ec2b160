//! # Key Rotation Across the Stack
//!
//! A message sealed under the previous key version is captured off the wire
//! and replayed after rotation, standing in for a message in flight while
//! the key changed.

#[cfg(test)]
mod tests {
    use crate::support::{bearer, order, recv_within, token, Stack, ORDERS};
    use shared_bus::{CancellationToken, MessageBroker};
    use shared_types::header_names;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    /// Publish one admin order and return what the transport saw.
    async fn capture_v1_wrapper(
        stack: &Stack,
    ) -> (
        sb_01_message_encryption::EncryptedMessageWrapper,
        shared_types::MessageHeaders,
    ) {
        let (_tap, mut wire) = stack.tap_wire().await;
        let admin = token("svc-admin", &["admin"], 600);
        stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap();
        let (wrapper, headers, _topic) = recv_within(&mut wire, WAIT).await;
        assert_eq!(headers.get(header_names::KEY_VERSION), Some("v1"));
        (wrapper, headers)
    }

    #[tokio::test]
    async fn test_in_flight_message_decrypts_within_grace() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        let (wrapper, headers) = capture_v1_wrapper(&stack).await;

        stack.rotate_to("v2");
        assert_eq!(stack.rotation.current_version(), "v2");

        let (_sub, mut orders) = stack.collect_orders().await;
        stack.inject(wrapper, headers, ORDERS).await;

        assert_eq!(recv_within(&mut orders, WAIT).await, order());
    }

    #[tokio::test]
    async fn test_new_messages_use_rotated_key() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        stack.rotate_to("v2");

        let (_tap, mut wire) = stack.tap_wire().await;
        let admin = token("svc-admin", &["admin"], 600);
        stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap();

        let (_wrapper, headers, _topic) = recv_within(&mut wire, WAIT).await;
        assert_eq!(headers.get(header_names::KEY_VERSION), Some("v2"));
    }

    #[tokio::test]
    async fn test_in_flight_message_refused_after_grace() {
        let stack = Stack::start(Duration::from_millis(50)).await;
        let (wrapper, headers) = capture_v1_wrapper(&stack).await;

        stack.rotate_to("v2");
        tokio::time::sleep(Duration::from_millis(150)).await;

        let (_sub, mut orders) = stack.collect_orders().await;
        stack.inject(wrapper, headers, ORDERS).await;

        let reasons = stack.dead_letters(1).await;
        assert!(reasons[0].contains("Decryption failed"), "{}", reasons[0]);
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cleanup_forgets_expired_versions() {
        let stack = Stack::start(Duration::from_millis(20)).await;
        stack.rotate_to("v2");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(stack.rotation.cleanup_expired_key_versions(), 1);
        assert_eq!(stack.rotation.get_valid_key_versions(), vec!["v2"]);
        assert!(stack.rotation.get_key_version_metadata("v1").is_none());
    }
}
