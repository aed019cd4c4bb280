//! Pending correlation state, timer handles and router statistics.

use crate::domain::correlation::CorrelationId;
use serde::Serialize;
use shared_types::{ErrorCause, Exchange, ExchangeStatus};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// One initiator waiting on its bridge.
///
/// Lives in the correlation store from `accept_initiator` until the initiator
/// reaches a terminal status (or carries a propagated fault).
#[derive(Debug, Clone)]
pub struct PendingCorrelation {
    pub correlation_id: CorrelationId,
    /// The exchange to complete and forward once the bridge resolves.
    pub initiator: Exchange,
    /// The request leg, once dispatched.
    pub bridged: Option<Exchange>,
    pub created_at: Instant,
    /// When the timeout fires, if one is armed.
    pub deadline: Option<Instant>,
    /// The request leg acknowledged DONE.
    pub request_sent: bool,
    pub timeout: Option<TimeoutHandle>,
}

impl PendingCorrelation {
    pub fn new(correlation_id: CorrelationId, initiator: Exchange) -> Self {
        Self {
            correlation_id,
            initiator,
            bridged: None,
            created_at: Instant::now(),
            deadline: None,
            request_sent: false,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_bridged(mut self, leg: Exchange) -> Self {
        self.bridged = Some(leg);
        self
    }

    /// Attach an armed timer; its fire instant becomes the deadline.
    pub fn arm(&mut self, handle: TimeoutHandle) {
        self.deadline = Some(handle.fire_at());
        self.timeout = Some(handle);
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct TimerState {
    cancelled: AtomicBool,
    wake: Notify,
}

/// Handle to a scheduled timeout.
///
/// Clones share the cancellation flag. Cancelling is best-effort: a timer
/// that already started firing runs to completion, so callbacks must re-check
/// the store.
#[derive(Debug, Clone)]
pub struct TimeoutHandle {
    correlation_id: CorrelationId,
    fire_at: Instant,
    state: Arc<TimerState>,
}

impl TimeoutHandle {
    pub fn new(correlation_id: CorrelationId, fire_at: Instant) -> Self {
        Self {
            correlation_id,
            fire_at,
            state: Arc::default(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn fire_at(&self) -> Instant {
        self.fire_at
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        // Stores a permit if the timer task is not waiting yet
        self.state.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.state.wake.notified().await;
    }
}

/// Router statistics
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Correlations registered whose request leg was dispatched
    pub registered: AtomicU64,
    /// Initiators forwarded DONE
    pub resolved: AtomicU64,
    /// Initiators forwarded carrying a fault
    pub faulted: AtomicU64,
    /// Initiators forwarded ERROR (other than timeout or shutdown)
    pub failed: AtomicU64,
    /// Initiators failed by a timeout
    pub timed_out: AtomicU64,
    /// Initiators failed by shutdown
    pub drained: AtomicU64,
    /// Signals for correlations that were no longer pending
    pub discarded: AtomicU64,
    /// Rejected duplicate registrations
    pub duplicates: AtomicU64,
    /// Failed `DeliverySink::send` calls
    pub delivery_failures: AtomicU64,
}

impl BridgeStats {
    /// Count a delivered terminal (or faulted) initiator by how it ended.
    ///
    /// Returns the outcome label used for metrics.
    pub fn record_resolution(
        &self,
        status: ExchangeStatus,
        cause: Option<&ErrorCause>,
    ) -> &'static str {
        let (counter, label) = match (status, cause) {
            (ExchangeStatus::Active, _) => (&self.faulted, "faulted"),
            (ExchangeStatus::Done, _) => (&self.resolved, "done"),
            (ExchangeStatus::Error, Some(ErrorCause::Timeout { .. })) => {
                (&self.timed_out, "timed_out")
            }
            (ExchangeStatus::Error, Some(ErrorCause::Shutdown)) => (&self.drained, "drained"),
            (ExchangeStatus::Error, _) => (&self.failed, "failed"),
        };
        counter.fetch_add(1, Ordering::Relaxed);
        label
    }

    pub fn snapshot(&self, pending: usize) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.registered.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            pending,
        }
    }
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub resolved: u64,
    pub faulted: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub drained: u64,
    pub discarded: u64,
    pub duplicates: u64,
    pub delivery_failures: u64,
    /// Correlations still in the store
    pub pending: usize,
}

impl StatsSnapshot {
    /// Initiators forwarded in any terminal or faulted form.
    pub fn forwarded(&self) -> u64 {
        self.resolved + self.faulted + self.failed + self.timed_out + self.drained
    }
}
