//! Timeout scheduler on tokio timers.
//!
//! Each timer is its own task waiting on `sleep_until` or cancellation,
//! whichever comes first. Tasks are never aborted: a callback that already
//! started runs to completion, and callbacks re-check the store.

use crate::domain::{CorrelationId, TimeoutHandle};
use crate::ports::outbound::{TimeoutCallback, TimeoutScheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{trace, warn};

/// Default timeout scheduler.
#[derive(Debug, Default)]
pub struct TokioTimeoutScheduler {
    /// Runtime to spawn timers on; the caller's runtime when `None`.
    runtime: Option<Handle>,
    /// Timers spawned and not yet finished.
    armed: Arc<AtomicUsize>,
}

impl TokioTimeoutScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn timers on a specific runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            armed: Arc::default(),
        }
    }

    /// Timers that have neither fired nor observed their cancellation.
    pub fn armed(&self) -> usize {
        self.armed.load(Ordering::Acquire)
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }
}

impl TimeoutScheduler for TokioTimeoutScheduler {
    fn schedule(
        &self,
        correlation_id: &CorrelationId,
        delay: Duration,
        callback: TimeoutCallback,
    ) -> Option<TimeoutHandle> {
        if delay.is_zero() {
            return None;
        }
        let Some(runtime) = self.runtime() else {
            warn!(
                correlation_id = %correlation_id,
                "No tokio runtime available, timeout not armed"
            );
            return None;
        };

        let handle = TimeoutHandle::new(correlation_id.clone(), Instant::now() + delay);
        let timer = handle.clone();
        let armed = self.armed.clone();
        armed.fetch_add(1, Ordering::AcqRel);

        runtime.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep_until(timer.fire_at()) => {}
                () = timer.cancelled() => {}
            }
            armed.fetch_sub(1, Ordering::AcqRel);

            if timer.is_cancelled() {
                trace!(correlation_id = %timer.correlation_id(), "Timer cancelled");
                return;
            }
            trace!(correlation_id = %timer.correlation_id(), "Timer fired");
            callback().await;
        });

        Some(handle)
    }

    fn cancel(&self, handle: &TimeoutHandle) {
        handle.cancel();
    }
}
