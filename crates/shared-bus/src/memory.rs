//! # In-Memory Broker
//!
//! Reference transport used by tests and single-process deployments.
//! Distributed deployments plug in a different `MessageBroker`.

use crate::broker::{MessageBroker, PublishOptions, SubscribeOptions};
use crate::message::{decode, encode, BusMessage};
use crate::subscriber::{DeliveryContext, DeliveryControl, MessageHandler, Subscription};
use crate::{DEFAULT_CHANNEL_CAPACITY, DLQ_TOPIC, MAX_DELIVERY_ATTEMPTS};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{BusError, MessageHeaders};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// One encoded message on the wire.
#[derive(Debug, Clone)]
struct Delivery {
    message_id: Uuid,
    message_type: String,
    topic: String,
    headers: MessageHeaders,
    payload: Arc<Vec<u8>>,
}

/// A rejected delivery parked for investigation.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Id of the rejected message.
    pub message_id: Uuid,
    /// Routing type of the rejected message.
    pub message_type: String,
    /// Topic it was published on.
    pub topic: String,
    /// Headers as published.
    pub headers: MessageHeaders,
    /// Why it was dead-lettered.
    pub reason: String,
}

#[derive(Debug, Default)]
struct BrokerStats {
    published: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
}

const OUTCOME_NONE: u8 = 0;
const OUTCOME_REQUEUE: u8 = 1;
const OUTCOME_DEAD_LETTER: u8 = 2;

/// Records the handler's rejection decision for one delivery attempt.
#[derive(Default)]
struct AttemptOutcome(AtomicU8);

impl DeliveryControl for AttemptOutcome {
    fn reject(&self, requeue: bool) {
        let outcome = if requeue {
            OUTCOME_REQUEUE
        } else {
            OUTCOME_DEAD_LETTER
        };
        // First decision wins.
        let _ = self
            .0
            .compare_exchange(OUTCOME_NONE, outcome, Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// In-memory implementation of the broker.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics;
/// each subscription runs in its own task and filters by message type and topic.
pub struct InMemoryBroker {
    /// Broadcast sender for deliveries.
    sender: broadcast::Sender<Delivery>,

    /// Cancelled on dispose; parent of every subscription token.
    shutdown: CancellationToken,

    running: AtomicBool,
    disposed: AtomicBool,

    /// Rejected deliveries.
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,

    stats: Arc<BrokerStats>,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a new in-memory broker with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory broker with specified capacity, at least 1.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            dead_letters: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(BrokerStats::default()),
            capacity,
        }
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns true once disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Number of live subscription receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total messages accepted for publishing.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.stats.published.load(Ordering::Relaxed)
    }

    /// Total deliveries handled successfully.
    #[must_use]
    pub fn messages_delivered(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }

    /// Total deliveries routed to the dead letter queue.
    #[must_use]
    pub fn messages_rejected(&self) -> u64 {
        self.stats.rejected.load(Ordering::Relaxed)
    }

    /// Snapshot of the dead letter queue.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().clone()
    }

    fn ensure_usable(&self) -> Result<(), BusError> {
        if self.is_disposed() {
            return Err(BusError::Disposed);
        }
        Ok(())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish<T: BusMessage>(
        &self,
        message: T,
        options: PublishOptions,
        cancel: &CancellationToken,
    ) -> Result<(), BusError> {
        self.ensure_usable()?;
        if !self.is_running() {
            return Err(BusError::NotRunning);
        }

        let topic = options.topic_or::<T>().to_string();
        let payload = encode(&message)?;

        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }

        let delivery = Delivery {
            message_id: options.message_id.unwrap_or_else(Uuid::new_v4),
            message_type: T::MESSAGE_TYPE.to_string(),
            topic,
            headers: options.headers,
            payload: Arc::new(payload),
        };

        self.stats.published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(delivery) {
            Ok(receivers) => {
                debug!(
                    message_type = T::MESSAGE_TYPE,
                    receivers, "Message published"
                );
            }
            Err(e) => {
                warn!(
                    message_type = T::MESSAGE_TYPE,
                    error = %e,
                    "Message dropped (no receivers)"
                );
            }
        }
        Ok(())
    }

    async fn subscribe<T, H>(
        &self,
        handler: H,
        options: SubscribeOptions,
        cancel: &CancellationToken,
    ) -> Result<Subscription, BusError>
    where
        T: BusMessage,
        H: MessageHandler<T>,
    {
        self.ensure_usable()?;
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }

        let mut receiver = self.sender.subscribe();
        let token = self.shutdown.child_token();
        let task_token = token.clone();
        let dead_letters = Arc::clone(&self.dead_letters);
        let stats = Arc::clone(&self.stats);
        let topic_filter = options.topic;

        tokio::spawn(async move {
            loop {
                let delivery = tokio::select! {
                    _ = task_token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(d) => d,
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(count)) => {
                            warn!(lagged = count, message_type = T::MESSAGE_TYPE, "Subscriber lagged, deliveries dropped");
                            continue;
                        }
                    },
                };

                if delivery.message_type != T::MESSAGE_TYPE {
                    continue;
                }
                if let Some(topic) = &topic_filter {
                    if &delivery.topic != topic {
                        continue;
                    }
                }

                dispatch::<T, H>(&handler, &delivery, &dead_letters, &stats).await;
            }
            debug!(message_type = T::MESSAGE_TYPE, "Subscription task finished");
        });

        debug!(message_type = T::MESSAGE_TYPE, "New subscription created");
        Ok(Subscription::new(T::MESSAGE_TYPE, token))
    }

    async fn start(&self, _cancel: &CancellationToken) -> Result<(), BusError> {
        self.ensure_usable()?;
        self.running.store(true, Ordering::SeqCst);
        debug!("In-memory broker started");
        Ok(())
    }

    async fn stop(&self, _cancel: &CancellationToken) -> Result<(), BusError> {
        self.running.store(false, Ordering::SeqCst);
        debug!("In-memory broker stopped");
        Ok(())
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        debug!("In-memory broker disposed");
    }
}

/// Deliver one message to a handler, honouring requeue up to the attempt limit.
async fn dispatch<T, H>(
    handler: &H,
    delivery: &Delivery,
    dead_letters: &Mutex<Vec<DeadLetter>>,
    stats: &BrokerStats,
) where
    T: BusMessage,
    H: MessageHandler<T>,
{
    let dead_letter = |reason: String| {
        stats.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(
            message_id = %delivery.message_id,
            message_type = %delivery.message_type,
            topic = DLQ_TOPIC,
            reason = %reason,
            "Delivery dead-lettered"
        );
        dead_letters.lock().push(DeadLetter {
            message_id: delivery.message_id,
            message_type: delivery.message_type.clone(),
            topic: delivery.topic.clone(),
            headers: delivery.headers.clone(),
            reason,
        });
    };

    for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
        let message: T = match decode(&delivery.payload) {
            Ok(m) => m,
            Err(e) => {
                dead_letter(e.to_string());
                return;
            }
        };

        let outcome = Arc::new(AttemptOutcome::default());
        let mut context = DeliveryContext::new(
            delivery.message_id,
            delivery.message_type.clone(),
            delivery.topic.clone(),
            delivery.headers.clone(),
            outcome.clone(),
        );
        context.attempt = attempt;

        let result = handler.handle(message, context).await;

        match outcome.0.load(Ordering::SeqCst) {
            OUTCOME_DEAD_LETTER => {
                let reason = match &result {
                    Err(e) => e.to_string(),
                    Ok(()) => "rejected by handler".to_string(),
                };
                dead_letter(reason);
                return;
            }
            OUTCOME_REQUEUE if attempt < MAX_DELIVERY_ATTEMPTS => {
                debug!(message_id = %delivery.message_id, attempt, "Delivery requeued");
                continue;
            }
            OUTCOME_REQUEUE => {
                dead_letter(format!("requeue limit of {MAX_DELIVERY_ATTEMPTS} attempts reached"));
                return;
            }
            _ => {}
        }

        match result {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(
                    message_id = %delivery.message_id,
                    message_type = %delivery.message_type,
                    error = %e,
                    "Handler failed"
                );
            }
        }
        return;
    }
}
