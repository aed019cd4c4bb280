//! Driven Ports (SPI - Outbound)
//!
//! Delivery goes through [`shared_bus::DeliverySink`]; the two services below
//! are specific to correlation.

use crate::domain::{CorrelationId, PendingCorrelation, TimeoutHandle};
use crate::error::StoreError;
use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::Instant;

/// Pending correlations keyed by correlation id.
///
/// Every operation is atomic per key. `remove` is the arbiter of races:
/// exactly one caller gets the entry, everyone after sees `NotFound`.
pub trait CorrelationStore: Send + Sync {
    /// Insert a new entry.
    ///
    /// # Errors
    ///
    /// `Duplicate` if `id` is present. The existing entry is left untouched.
    fn put(&self, id: CorrelationId, entry: PendingCorrelation) -> Result<(), StoreError>;

    /// Copy of the entry.
    fn get(&self, id: &CorrelationId) -> Result<PendingCorrelation, StoreError>;

    /// Take the entry out.
    fn remove(&self, id: &CorrelationId) -> Result<PendingCorrelation, StoreError>;

    /// Mutate the entry in place while holding its key.
    fn update(
        &self,
        id: &CorrelationId,
        f: &mut dyn FnMut(&mut PendingCorrelation),
    ) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids whose deadline is at or before `now`.
    fn expired(&self, now: Instant) -> Vec<CorrelationId>;

    /// Every pending id.
    fn ids(&self) -> Vec<CorrelationId>;
}

/// Deferred timeout action.
pub type TimeoutCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// One-shot timers per correlation.
pub trait TimeoutScheduler: Send + Sync {
    /// Run `callback` after `delay` on a scheduler-owned task.
    ///
    /// A zero delay means no timeout: nothing is scheduled and `None` is
    /// returned.
    fn schedule(
        &self,
        correlation_id: &CorrelationId,
        delay: Duration,
        callback: TimeoutCallback,
    ) -> Option<TimeoutHandle>;

    /// Best-effort cancel. A callback that already started still runs.
    fn cancel(&self, handle: &TimeoutHandle);
}
