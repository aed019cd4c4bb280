//! # Exchange Bus
//!
//! In-memory delivery sink that fans exchanges out to filtered subscribers.

use crate::filter::ExchangeFilter;
use crate::sink::{DeliveryError, DeliverySink};
use crate::subscriber::{ExchangeStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::Exchange;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// In-memory implementation of the exchange bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Suitable for a single process; a distributed deployment would put a real
/// transport behind [`DeliverySink`] instead.
pub struct InMemoryExchangeBus {
    /// Broadcast sender for exchanges.
    sender: broadcast::Sender<Exchange>,

    /// Total exchanges handed to the bus.
    exchanges_sent: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryExchangeBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            exchanges_sent: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to exchanges matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: ExchangeFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        debug!(filter = ?filter, "New subscription created");
        Subscription::new(receiver, filter)
    }

    /// Get a stream of exchanges matching a filter.
    #[must_use]
    pub fn exchange_stream(&self, filter: ExchangeFilter) -> ExchangeStream {
        ExchangeStream::new(self.sender.subscribe(), filter)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total exchanges handed to the bus, delivered or not.
    #[must_use]
    pub fn exchanges_sent(&self) -> u64 {
        self.exchanges_sent.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryExchangeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliverySink for InMemoryExchangeBus {
    async fn send(&self, exchange: Exchange) -> Result<(), DeliveryError> {
        let exchange_id = exchange.id().clone();
        let status = exchange.status();

        // Always increment counter (delivery was attempted)
        self.exchanges_sent.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(exchange) {
            Ok(receivers) => {
                debug!(
                    exchange_id = %exchange_id,
                    status = ?status,
                    receivers,
                    "Exchange delivered"
                );
                Ok(())
            }
            Err(_) => {
                warn!(exchange_id = %exchange_id, "Exchange dropped (no subscribers)");
                Err(DeliveryError::NoRoute { exchange_id })
            }
        }
    }
}
