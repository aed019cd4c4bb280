//! Exchange Router - the correlation state machine
//!
//! ```text
//!                      put
//! accept_initiator ─────────→ [AWAITING_BRIDGE_RESPONSE] ──response──→ [RESOLVED]
//!                                 │   ↻ leg DONE (request_sent)
//!                                 ├── leg ERROR / FAULT ─────────────→ [RESOLVED]
//!                                 └── timeout / sweep ───────────────→ [TIMED_OUT]
//! ```
//!
//! There is no router-wide lock. Every path that ends a correlation goes
//! through `CorrelationStore::remove`, and whoever removes the entry owns the
//! initiator. Everyone after that sees `NotFound` and discards.

use crate::adapters::{InMemoryCorrelationStore, TokioTimeoutScheduler};
use crate::config::{BridgeConfig, ConfigError, TimeoutStart};
use crate::domain::{
    BridgeStats, CorrelationExtractor, CorrelationId, ExchangeIdExtractor, PendingCorrelation,
    PropertyExtractor, Resolution, StatsSnapshot,
};
use crate::error::{BridgeError, BridgeResult, StoreError};
use crate::metrics;
use crate::ports::inbound::{BridgeApi, BridgeOutcome};
use crate::ports::outbound::{CorrelationStore, TimeoutCallback, TimeoutScheduler};
use async_trait::async_trait;
use bus_telemetry::{log_correlation_event, log_exchange_event};
use futures::FutureExt;
use parking_lot::Mutex;
use shared_bus::DeliverySink;
use shared_types::{ErrorCause, Exchange, ExchangeStatus, Role};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Correlation router.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct ExchangeRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    config: BridgeConfig,
    store: Arc<dyn CorrelationStore>,
    scheduler: Arc<dyn TimeoutScheduler>,
    sink: Arc<dyn DeliverySink>,
    request_correlation: Arc<dyn CorrelationExtractor>,
    response_correlation: Arc<dyn CorrelationExtractor>,
    stats: BridgeStats,
    closed: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for [`ExchangeRouter`].
///
/// Defaults: in-memory store, tokio scheduler, exchange-id correlation for
/// initiators and the configured property for legs and responses.
pub struct ExchangeRouterBuilder {
    config: BridgeConfig,
    sink: Arc<dyn DeliverySink>,
    store: Option<Arc<dyn CorrelationStore>>,
    scheduler: Option<Arc<dyn TimeoutScheduler>>,
    request_correlation: Option<Arc<dyn CorrelationExtractor>>,
    response_correlation: Option<Arc<dyn CorrelationExtractor>>,
}

impl ExchangeRouterBuilder {
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CorrelationStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// How initiators are keyed.
    #[must_use]
    pub fn request_correlation(mut self, extractor: impl CorrelationExtractor + 'static) -> Self {
        self.request_correlation = Some(Arc::new(extractor));
        self
    }

    /// How legs and responses are matched back.
    #[must_use]
    pub fn response_correlation(mut self, extractor: impl CorrelationExtractor + 'static) -> Self {
        self.response_correlation = Some(Arc::new(extractor));
        self
    }

    /// # Errors
    ///
    /// Returns the first configuration problem found by
    /// [`BridgeConfig::validate`].
    pub fn build(self) -> Result<ExchangeRouter, ConfigError> {
        self.config.validate()?;

        let response_correlation = self.response_correlation.unwrap_or_else(|| {
            Arc::new(PropertyExtractor::new(self.config.correlation_property.clone()))
        });

        info!(
            mode = self.config.mode.as_str(),
            timeout_ms = self.config.timeout.as_millis() as u64,
            timeout_start = ?self.config.timeout_start,
            correlation_property = %self.config.correlation_property,
            "Exchange router configured"
        );

        Ok(ExchangeRouter {
            inner: Arc::new(RouterInner {
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(InMemoryCorrelationStore::new())),
                scheduler: self
                    .scheduler
                    .unwrap_or_else(|| Arc::new(TokioTimeoutScheduler::new())),
                sink: self.sink,
                request_correlation: self
                    .request_correlation
                    .unwrap_or_else(|| Arc::new(ExchangeIdExtractor)),
                response_correlation,
                config: self.config,
                stats: BridgeStats::default(),
                closed: AtomicBool::new(false),
                sweeper: Mutex::new(None),
            }),
        })
    }
}

impl ExchangeRouter {
    /// Router with default store, scheduler and extractors.
    pub fn new(config: BridgeConfig, sink: Arc<dyn DeliverySink>) -> Result<Self, ConfigError> {
        Self::builder(config, sink).build()
    }

    pub fn builder(config: BridgeConfig, sink: Arc<dyn DeliverySink>) -> ExchangeRouterBuilder {
        ExchangeRouterBuilder {
            config,
            sink,
            store: None,
            scheduler: None,
            request_correlation: None,
            response_correlation: None,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &dyn CorrelationStore {
        self.inner.store.as_ref()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.store.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot(self.inner.store.len())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Retire every correlation whose deadline has passed, as if its timer
    /// had fired.
    ///
    /// Backstop for timers that were lost. Returns how many were retired.
    pub async fn sweep_expired(&self) -> usize {
        let mut retired = 0;
        for correlation_id in self.inner.store.expired(Instant::now()) {
            match self.on_timeout(&correlation_id).await {
                Ok(outcome) if outcome.is_resolved() => retired += 1,
                Ok(_) => {}
                Err(error) => warn!(
                    correlation_id = %correlation_id,
                    error = %error,
                    "Expired correlation could not be forwarded"
                ),
            }
        }
        if retired > 0 {
            debug!(retired, "Swept expired correlations");
        }
        retired
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `sweep_interval`.
    ///
    /// Returns `false` if the sweeper is disabled or no runtime is available.
    /// The task stops on [`shutdown`](Self::shutdown) or once every router
    /// clone is dropped.
    pub fn spawn_sweeper(&self) -> bool {
        let period = self.inner.config.sweep_interval;
        if period.is_zero() {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime available, expiry sweeper not started");
            return false;
        };

        let router = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(inner) = router.upgrade() else {
                    break;
                };
                ExchangeRouter { inner }.sweep_expired().await;
            }
        });

        if let Some(previous) = self.inner.sweeper.lock().replace(task) {
            previous.abort();
        }
        debug!(period_ms = period.as_millis() as u64, "Expiry sweeper started");
        true
    }

    /// Stop accepting initiators and fail every pending one with
    /// [`ErrorCause::Shutdown`].
    ///
    /// Delivery failures are logged and counted, never returned. Returns how
    /// many initiators were forwarded.
    pub async fn shutdown(&self) -> usize {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        if let Some(sweeper) = self.inner.sweeper.lock().take() {
            sweeper.abort();
        }

        let mut drained = 0;
        for correlation_id in self.inner.store.ids() {
            match self
                .resolve(&correlation_id, Resolution::Error(ErrorCause::Shutdown))
                .await
            {
                Ok(outcome) if outcome.is_resolved() => drained += 1,
                Ok(_) => {}
                Err(error) => warn!(
                    correlation_id = %correlation_id,
                    error = %error,
                    "Pending initiator lost during shutdown"
                ),
            }
        }

        info!(drained, "Exchange router shut down");
        drained
    }

    fn correlation_of(
        extractor: &dyn CorrelationExtractor,
        exchange: &Exchange,
    ) -> BridgeResult<CorrelationId> {
        extractor
            .extract(exchange)
            .ok_or_else(|| BridgeError::MissingCorrelationId {
                exchange_id: exchange.id().clone(),
            })
    }

    /// The one-way request leg for an initiator.
    fn build_leg(&self, correlation_id: &CorrelationId, initiator: &Exchange) -> Exchange {
        let config = &self.inner.config;
        let mut leg = Exchange::new(Role::Responder, config.mode.leg_pattern())
            .with_property(config.correlation_property.clone(), correlation_id.as_str());
        if let Some(payload) = initiator.payload() {
            leg = leg.with_payload(payload.clone());
        }
        if let Some(service) = &config.target_service {
            leg = leg.with_service(service.clone());
        }
        leg
    }

    /// Schedule a timeout and attach it to the entry.
    fn arm_timeout(&self, correlation_id: &CorrelationId) {
        let Some(handle) = self
            .inner
            .scheduler
            .schedule(correlation_id, self.inner.config.timeout, self.timeout_callback(correlation_id))
        else {
            return;
        };

        let mut attached = false;
        let update = self.inner.store.update(correlation_id, &mut |entry: &mut PendingCorrelation| {
            if entry.timeout.is_none() {
                entry.arm(handle.clone());
                attached = true;
            }
        });

        if update.is_err() || !attached {
            // Resolved in the meantime, or already armed
            self.inner.scheduler.cancel(&handle);
        }
    }

    fn timeout_callback(&self, correlation_id: &CorrelationId) -> TimeoutCallback {
        let router: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let correlation_id = correlation_id.clone();
        Box::new(move || {
            async move {
                let Some(inner) = router.upgrade() else {
                    return;
                };
                let router = ExchangeRouter { inner };
                if let Err(error) = router.on_timeout(&correlation_id).await {
                    warn!(
                        correlation_id = %correlation_id,
                        error = %error,
                        "Timed out initiator could not be forwarded"
                    );
                }
            }
            .boxed()
        })
    }

    /// Take the entry, apply the outcome to its initiator, and forward it.
    async fn resolve(
        &self,
        correlation_id: &CorrelationId,
        resolution: Resolution,
    ) -> BridgeResult<BridgeOutcome> {
        let entry = match self.inner.store.remove(correlation_id) {
            Ok(entry) => entry,
            Err(StoreError::NotFound { .. }) => return Ok(self.discard(correlation_id)),
            Err(error) => return Err(error.into()),
        };
        metrics::set_pending(self.inner.store.len());

        if let Some(handle) = &entry.timeout {
            self.inner.scheduler.cancel(handle);
        }

        let mut initiator = entry.initiator;
        resolution.apply(&mut initiator)?;
        self.forward(correlation_id, initiator).await
    }

    async fn forward(
        &self,
        correlation_id: &CorrelationId,
        initiator: Exchange,
    ) -> BridgeResult<BridgeOutcome> {
        let outcome = BridgeOutcome::Resolved {
            correlation_id: correlation_id.clone(),
            initiator_id: initiator.id().clone(),
            status: initiator.status(),
        };
        let cause = initiator.error().cloned();
        log_exchange_event!(debug, "Forwarding initiator", initiator, correlation_id = %correlation_id);

        if let Err(error) = self.inner.sink.send(initiator).await {
            self.inner.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
            metrics::record_delivery_failure();
            warn!(
                correlation_id = %correlation_id,
                error = %error,
                "Initiator delivery failed"
            );
            return Err(error.into());
        }

        if let BridgeOutcome::Resolved { status, .. } = &outcome {
            metrics::record_resolved(self.inner.stats.record_resolution(*status, cause.as_ref()));
        }
        Ok(outcome)
    }

    fn discard(&self, correlation_id: &CorrelationId) -> BridgeOutcome {
        self.inner.stats.discarded.fetch_add(1, Ordering::Relaxed);
        metrics::record_discarded();
        log_correlation_event!(debug, "Correlation no longer pending, signal discarded", correlation_id);
        BridgeOutcome::Discarded {
            correlation_id: correlation_id.clone(),
        }
    }
}

#[async_trait]
impl BridgeApi for ExchangeRouter {
    async fn accept_initiator(&self, exchange: Exchange) -> BridgeResult<BridgeOutcome> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        if exchange.role() != Role::Initiator {
            return Err(BridgeError::InvalidExchange {
                exchange_id: exchange.id().clone(),
                reason: "not an initiator",
            });
        }
        if exchange.status() != ExchangeStatus::Active {
            return Err(BridgeError::InvalidExchange {
                exchange_id: exchange.id().clone(),
                reason: "initiator is not active",
            });
        }

        let correlation_id =
            Self::correlation_of(self.inner.request_correlation.as_ref(), &exchange)?;
        let leg = self.build_leg(&correlation_id, &exchange);
        let leg_id = leg.id().clone();
        let entry = PendingCorrelation::new(correlation_id.clone(), exchange).with_bridged(leg.clone());

        if let Err(store_error) = self.inner.store.put(correlation_id.clone(), entry) {
            if matches!(store_error, StoreError::Duplicate { .. }) {
                self.inner.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                error!(
                    correlation_id = %correlation_id,
                    "Duplicate correlation id: an unresolved exchange already uses it"
                );
            }
            return Err(store_error.into());
        }

        // Shutdown may have taken its snapshot between the check above and `put`
        if self.is_closed() {
            if let Ok(entry) = self.inner.store.remove(&correlation_id) {
                if let Some(handle) = &entry.timeout {
                    self.inner.scheduler.cancel(handle);
                }
            }
            log_correlation_event!(debug, "Router closed during registration, initiator refused", correlation_id);
            return Err(BridgeError::Closed);
        }
        metrics::set_pending(self.inner.store.len());

        if self.inner.config.timeout_start == TimeoutStart::OnAccept {
            self.arm_timeout(&correlation_id);
        }

        log_exchange_event!(debug, "Dispatching request leg", leg, correlation_id = %correlation_id);
        if let Err(delivery_error) = self.inner.sink.send(leg).await {
            self.inner.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
            metrics::record_delivery_failure();
            warn!(
                correlation_id = %correlation_id,
                error = %delivery_error,
                "Request leg delivery failed, rolling back correlation"
            );
            if let Ok(entry) = self.inner.store.remove(&correlation_id) {
                if let Some(handle) = &entry.timeout {
                    self.inner.scheduler.cancel(handle);
                }
            }
            metrics::set_pending(self.inner.store.len());
            return Err(delivery_error.into());
        }
        self.inner.stats.registered.fetch_add(1, Ordering::Relaxed);
        metrics::record_registered();

        Ok(BridgeOutcome::Dispatched {
            correlation_id,
            leg_id,
        })
    }

    async fn accept_bridge_response(&self, exchange: Exchange) -> BridgeResult<BridgeOutcome> {
        let correlation_id =
            Self::correlation_of(self.inner.response_correlation.as_ref(), &exchange)?;
        let resolution =
            Resolution::from_leg(&exchange, self.inner.config.mode.propagates_faults());
        self.resolve(&correlation_id, resolution).await
    }

    async fn accept_bridge_terminal(&self, exchange: Exchange) -> BridgeResult<BridgeOutcome> {
        if exchange.status() == ExchangeStatus::Active && exchange.fault().is_none() {
            return Err(BridgeError::InvalidExchange {
                exchange_id: exchange.id().clone(),
                reason: "leg is still active",
            });
        }
        let correlation_id =
            Self::correlation_of(self.inner.response_correlation.as_ref(), &exchange)?;

        if exchange.status() != ExchangeStatus::Done {
            // ERROR or FAULT on the request leg ends the bridge
            let resolution =
                Resolution::from_leg(&exchange, self.inner.config.mode.propagates_faults());
            return self.resolve(&correlation_id, resolution).await;
        }

        let mut awaits_response = false;
        let mut first_ack = false;
        let update = self.inner.store.update(&correlation_id, &mut |entry: &mut PendingCorrelation| {
            awaits_response = entry.initiator.pattern().expects_response();
            if awaits_response {
                first_ack = !entry.request_sent;
                entry.request_sent = true;
            }
        });
        match update {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) => return Ok(self.discard(&correlation_id)),
            Err(error) => return Err(error.into()),
        }

        if !awaits_response {
            // One-way bridge: the leg's DONE is the answer
            return self.resolve(&correlation_id, Resolution::Payload(None)).await;
        }

        if first_ack && self.inner.config.timeout_start == TimeoutStart::OnRequestSent {
            self.arm_timeout(&correlation_id);
        }
        log_correlation_event!(debug, "Request leg acknowledged, awaiting response", correlation_id, first_ack);
        Ok(BridgeOutcome::RequestAcknowledged { correlation_id })
    }

    async fn on_timeout(&self, correlation_id: &CorrelationId) -> BridgeResult<BridgeOutcome> {
        let timeout_ms = u64::try_from(self.inner.config.timeout.as_millis()).unwrap_or(u64::MAX);
        let outcome = self
            .resolve(correlation_id, Resolution::Error(ErrorCause::Timeout { timeout_ms }))
            .await?;
        if outcome.is_resolved() {
            warn!(correlation_id = %correlation_id, timeout_ms, "Correlation timed out");
        }
        Ok(outcome)
    }
}
