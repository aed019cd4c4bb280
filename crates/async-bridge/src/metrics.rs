//! # Bridge Metrics
//!
//! Prometheus metrics for the correlation core.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! async-bridge = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `bridge_correlations_registered_total` - Counter of registered correlations
//! - `bridge_correlations_resolved_total` - Counter of forwarded initiators (by outcome)
//! - `bridge_correlations_timed_out_total` - Counter of timeouts
//! - `bridge_signals_discarded_total` - Counter of signals for correlations no longer pending
//! - `bridge_delivery_failures_total` - Counter of failed sends
//! - `bridge_correlations_pending` - Gauge of correlations in the store

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total correlations registered
    pub static ref CORRELATIONS_REGISTERED: IntCounter = register_int_counter!(
        "bridge_correlations_registered_total",
        "Total number of correlations registered"
    )
    .expect("Failed to create CORRELATIONS_REGISTERED metric");

    /// Total initiators forwarded, labeled by outcome
    pub static ref CORRELATIONS_RESOLVED: IntCounterVec = register_int_counter_vec!(
        "bridge_correlations_resolved_total",
        "Total number of initiators forwarded",
        &["outcome"]
    )
    .expect("Failed to create CORRELATIONS_RESOLVED metric");

    /// Total timeouts
    pub static ref CORRELATIONS_TIMED_OUT: IntCounter = register_int_counter!(
        "bridge_correlations_timed_out_total",
        "Total number of correlations failed by timeout"
    )
    .expect("Failed to create CORRELATIONS_TIMED_OUT metric");

    /// Total discarded signals
    pub static ref SIGNALS_DISCARDED: IntCounter = register_int_counter!(
        "bridge_signals_discarded_total",
        "Total number of signals for correlations no longer pending"
    )
    .expect("Failed to create SIGNALS_DISCARDED metric");

    /// Total delivery failures
    pub static ref DELIVERY_FAILURES: IntCounter = register_int_counter!(
        "bridge_delivery_failures_total",
        "Total number of failed deliveries"
    )
    .expect("Failed to create DELIVERY_FAILURES metric");

    /// Correlations currently pending
    pub static ref CORRELATIONS_PENDING: IntGauge = register_int_gauge!(
        "bridge_correlations_pending",
        "Number of correlations currently pending"
    )
    .expect("Failed to create CORRELATIONS_PENDING metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a registered correlation
#[cfg(feature = "metrics")]
pub fn record_registered() {
    CORRELATIONS_REGISTERED.inc();
}

/// Record a forwarded initiator with its outcome label
#[cfg(feature = "metrics")]
pub fn record_resolved(outcome: &str) {
    CORRELATIONS_RESOLVED.with_label_values(&[outcome]).inc();
    if outcome == "timed_out" {
        CORRELATIONS_TIMED_OUT.inc();
    }
}

/// Record a discarded signal
#[cfg(feature = "metrics")]
pub fn record_discarded() {
    SIGNALS_DISCARDED.inc();
}

/// Record a failed delivery
#[cfg(feature = "metrics")]
pub fn record_delivery_failure() {
    DELIVERY_FAILURES.inc();
}

/// Update the pending gauge
#[cfg(feature = "metrics")]
pub fn set_pending(pending: usize) {
    CORRELATIONS_PENDING.set(i64::try_from(pending).unwrap_or(i64::MAX));
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_registered() {}

#[cfg(not(feature = "metrics"))]
pub fn record_resolved(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_discarded() {}

#[cfg(not(feature = "metrics"))]
pub fn record_delivery_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn set_pending(_pending: usize) {}
