//! # Ciphertext Tampering
//!
//! Attacker with write access to the transport modifies captured wrappers
//! and replays them to subscribers.
//!
//! ## Attack Vectors
//!
//! - Flip a bit anywhere in `nonce || ciphertext || tag`
//! - Truncate the envelope below its fixed overhead
//! - Point the `KeyVersion` header at a version that does not exist
//! - Strip the `KeyVersion` header
//! - Relabel the wrapper as a different message type

#[cfg(test)]
mod tests {
    use crate::support::{bearer, order, recv_within, token, Stack, ORDERS};
    use sb_01_message_encryption::EncryptedMessageWrapper;
    use shared_bus::{CancellationToken, MessageBroker};
    use shared_types::{header_names, MessageHeaders, ENVELOPE_OVERHEAD};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    async fn captured(stack: &Stack) -> (EncryptedMessageWrapper, MessageHeaders) {
        let (_tap, mut wire) = stack.tap_wire().await;
        let admin = token("svc-admin", &["admin"], 600);
        stack
            .bus
            .publish(order(), bearer(&admin, ORDERS), &CancellationToken::new())
            .await
            .unwrap();
        let (wrapper, headers, _topic) = recv_within(&mut wire, WAIT).await;
        (wrapper, headers)
    }

    #[tokio::test]
    async fn test_bit_flips_are_dead_lettered() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        let (wrapper, headers) = captured(&stack).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        let len = wrapper.encrypted_payload.len();
        let positions = [0, 11, 12, len / 2, len - 16, len - 1];
        for &i in &positions {
            let mut forged = wrapper.clone();
            forged.encrypted_payload[i] ^= 0x01;
            stack.inject(forged, headers.clone(), ORDERS).await;
        }

        let reasons = stack.dead_letters(positions.len()).await;
        assert!(reasons.iter().all(|r| r.contains("Decryption failed")));
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_truncated_envelope_rejected() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        let (mut wrapper, headers) = captured(&stack).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        wrapper.encrypted_payload.truncate(ENVELOPE_OVERHEAD - 1);
        stack.inject(wrapper, headers, ORDERS).await;

        let reasons = stack.dead_letters(1).await;
        assert!(reasons[0].starts_with("Malformed ciphertext"), "{}", reasons[0]);
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_key_version_rejected() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        let (wrapper, mut headers) = captured(&stack).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        headers.insert(header_names::KEY_VERSION, "v404");
        stack.inject(wrapper, headers, ORDERS).await;

        stack.dead_letters(1).await;
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_key_version_header_rejected() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        let (wrapper, mut headers) = captured(&stack).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        headers.remove(header_names::KEY_VERSION);
        stack.inject(wrapper, headers, ORDERS).await;

        let reasons = stack.dead_letters(1).await;
        assert!(reasons[0].contains(header_names::KEY_VERSION));
        assert!(orders.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relabelled_wrapper_is_ignored() {
        let stack = Stack::start(Duration::from_secs(3600)).await;
        let (mut wrapper, headers) = captured(&stack).await;
        let (_sub, mut orders) = stack.collect_orders().await;

        wrapper.message_type = "payment.refunded".into();
        stack.inject(wrapper, headers, ORDERS).await;

        assert!(tokio::time::timeout(Duration::from_millis(200), orders.recv())
            .await
            .is_err());
        assert!(stack.broker.dead_letters().is_empty());
    }
}
