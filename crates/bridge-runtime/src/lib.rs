//! # Bridge Runtime
//!
//! Wires an [`ExchangeRouter`] to the in-memory exchange bus and a loopback
//! target, then drives batches of request/response initiators through it.
//!
//! ```text
//!  run_batch ──accept_initiator──→ ExchangeRouter ──leg──→ Exchange Bus ──→ LoopbackTarget
//!      ↑                              ↑    │                                    │
//!      │                              │    └──── resolved initiator ──→ Bus ────┼──→ run_batch
//!      │                              └──────── DONE / FAULT / ERROR, response ─┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Create the bus and the router (the bus is the router's sink)
//! 3. Start the expiry sweeper if configured
//! 4. Subscribe and start the loopback target

pub mod config;
pub mod loopback;

use async_bridge::{BridgeApi, ExchangeRouter, StatsSnapshot};
use serde::Serialize;
use shared_bus::{ExchangeFilter, InMemoryExchangeBus};
use shared_types::{ErrorCause, Exchange, ExchangeId, ExchangeStatus, Pattern, Role};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use config::{BatchConfig, ConfigError, LegReply, LoopbackConfig, RuntimeConfig};
pub use loopback::LoopbackTarget;

/// How a batch of initiators ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Initiators handed to the router.
    pub submitted: usize,
    /// Refused by the router.
    pub rejected: usize,
    pub done: usize,
    /// Returned `Active` with a fault.
    pub faulted: usize,
    pub timed_out: usize,
    /// Returned with any other error.
    pub failed: usize,
    /// Accepted but never returned before the idle timeout.
    pub unanswered: usize,
    pub elapsed: Duration,
}

impl RunReport {
    fn record(&mut self, initiator: &Exchange) {
        match (initiator.status(), initiator.error()) {
            (ExchangeStatus::Done, _) => self.done += 1,
            (ExchangeStatus::Active, _) => self.faulted += 1,
            (ExchangeStatus::Error, Some(ErrorCause::Timeout { .. })) => self.timed_out += 1,
            (ExchangeStatus::Error, _) => self.failed += 1,
        }
    }

    /// Initiators that came back, whatever their outcome.
    pub fn returned(&self) -> usize {
        self.done + self.faulted + self.timed_out + self.failed
    }
}

/// Router, bus and loopback target running together.
pub struct BridgeRuntime {
    bus: Arc<InMemoryExchangeBus>,
    router: ExchangeRouter,
    loopback: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl BridgeRuntime {
    /// Start the runtime. Must be called inside a tokio runtime.
    pub fn start(config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let bus = Arc::new(InMemoryExchangeBus::with_capacity(config.bus.capacity));
        let router = ExchangeRouter::new(config.bridge.clone(), bus.clone())?;
        if router.spawn_sweeper() {
            debug!("Expiry sweeper running");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let legs = bus.subscribe(LoopbackTarget::filter(&router));
        let loopback = LoopbackTarget::new(router.clone(), config.loopback.clone())
            .spawn(legs, shutdown_rx);

        info!(
            mode = config.bridge.mode.as_str(),
            timeout_ms = config.bridge.timeout.as_millis() as u64,
            target = config.bridge.target_service.as_deref().unwrap_or("-"),
            "Bridge runtime started"
        );

        Ok(Self {
            bus,
            router,
            loopback: Some(loopback),
            shutdown_tx,
        })
    }

    pub fn router(&self) -> &ExchangeRouter {
        &self.router
    }

    /// Submit `batch.requests` request/response initiators, at most
    /// `batch.concurrency` in flight, and wait for them to come back.
    pub async fn run_batch(&self, batch: &BatchConfig) -> RunReport {
        let started = Instant::now();
        let mut returned = self.bus.subscribe(ExchangeFilter::roles(vec![Role::Initiator]));
        let mut in_flight: HashSet<ExchangeId> = HashSet::new();
        let mut report = RunReport::default();

        loop {
            while report.submitted + report.rejected < batch.requests
                && in_flight.len() < batch.concurrency
            {
                let sequence = report.submitted + report.rejected;
                let initiator = Exchange::initiator(Pattern::RequestResponse)
                    .with_payload(format!("request {sequence}"));
                let id = initiator.id().clone();

                // Tracked before dispatch; the answer can beat accept_initiator back
                in_flight.insert(id.clone());
                match self.router.accept_initiator(initiator).await {
                    Ok(_) => report.submitted += 1,
                    Err(error) => {
                        in_flight.remove(&id);
                        report.rejected += 1;
                        warn!(exchange_id = %id, error = %error, "Initiator rejected");
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            match tokio::time::timeout(batch.idle_timeout, returned.recv()).await {
                Ok(Some(initiator)) => {
                    if in_flight.remove(initiator.id()) {
                        report.record(&initiator);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        in_flight = in_flight.len(),
                        idle_ms = batch.idle_timeout.as_millis() as u64,
                        "No initiator returned within idle timeout"
                    );
                    break;
                }
            }
        }

        report.unanswered = in_flight.len();
        report.elapsed = started.elapsed();
        info!(
            submitted = report.submitted,
            done = report.done,
            faulted = report.faulted,
            timed_out = report.timed_out,
            failed = report.failed,
            rejected = report.rejected,
            unanswered = report.unanswered,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Batch finished"
        );
        report
    }

    /// Drain the router, then stop the loopback target.
    ///
    /// Returns how many pending initiators were failed with `Shutdown`, and
    /// the router's final counters.
    pub async fn shutdown(mut self) -> (usize, StatsSnapshot) {
        let drained = self.router.shutdown().await;

        // No receiver left means the loopback already stopped
        let _ = self.shutdown_tx.send(true);
        if let Some(loopback) = self.loopback.take() {
            if let Err(error) = loopback.await {
                warn!(error = %error, "Loopback target task failed");
            }
        }

        let stats = self.router.stats();
        info!(drained, pending = stats.pending, "Bridge runtime stopped");
        (drained, stats)
    }
}
