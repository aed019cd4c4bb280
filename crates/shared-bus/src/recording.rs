//! # Recording Sink
//!
//! A [`DeliverySink`] that keeps every exchange it is handed. Used by tests
//! and by anything that needs to observe deliveries without a transport.

use crate::sink::{DeliveryError, DeliverySink};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Exchange, ExchangeId};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory sink that records deliveries and can inject failures.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Exchange>>,
    /// Failures returned by the next `send` calls, in order.
    failures: Mutex<VecDeque<DeliveryError>>,
    delivered: Notify,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send` fail with `error`. Queued failures are consumed
    /// in FIFO order; a failed send is not recorded.
    pub fn fail_next(&self, error: DeliveryError) {
        self.failures.lock().push_back(error);
    }

    /// Every exchange delivered so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Exchange> {
        self.sent.lock().clone()
    }

    /// Deliveries of a given exchange id.
    #[must_use]
    pub fn sent_with_id(&self, id: &ExchangeId) -> Vec<Exchange> {
        self.sent
            .lock()
            .iter()
            .filter(|e| e.id() == id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    /// Wait until at least `count` exchanges were delivered.
    ///
    /// Returns `false` if `within` elapsed first.
    pub async fn wait_for(&self, count: usize, within: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.delivered.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(within, wait).await.is_ok()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, exchange: Exchange) -> Result<(), DeliveryError> {
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.sent.lock().push(exchange);
        self.delivered.notify_waiters();
        Ok(())
    }
}
