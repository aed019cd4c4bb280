//! # async-bridge
//!
//! Correlation core of the exchange bus: satisfies one request/response
//! exchange by sending a one-way request leg and reconciling the DONE, ERROR
//! and FAULT signals that come back, in whatever order they arrive.
//!
//! ## Architecture
//!
//! ```text
//!   transport ──accept_initiator──→ ┌────────────────┐ ──request leg──→ DeliverySink
//!   transport ──accept_bridge_*───→ │ ExchangeRouter │ ──initiator────→ DeliverySink
//!   scheduler ──on_timeout────────→ └────────────────┘
//!                                      │         │
//!                         CorrelationStore   TimeoutScheduler
//! ```
//!
//! - [`ExchangeRouter`]: the state machine ([`BridgeApi`]).
//! - [`CorrelationStore`]: pending state with per-key atomic operations.
//!   [`InMemoryCorrelationStore`] is the default.
//! - [`TimeoutScheduler`]: cancellable one-shot timers.
//!   [`TokioTimeoutScheduler`] is the default.
//!
//! ## Races
//!
//! Responses, leg acknowledgements and timeouts for one correlation may run
//! concurrently. Removal from the store decides the winner; the losers get
//! [`BridgeOutcome::Discarded`], never an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use async_bridge::{BridgeApi, BridgeConfig, ExchangeRouter};
//!
//! let router = ExchangeRouter::new(
//!     BridgeConfig::default().with_timeout(Duration::from_secs(5)),
//!     sink,
//! )?;
//!
//! router.accept_initiator(request).await?;
//! // ... later, from the transport
//! router.accept_bridge_response(response).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryCorrelationStore, TokioTimeoutScheduler};
pub use config::{parse_duration, BridgeConfig, BridgeMode, ConfigError, TimeoutStart};
pub use domain::{
    BridgeStats, CorrelationExtractor, CorrelationId, ExchangeIdExtractor, PendingCorrelation,
    PropertyExtractor, Resolution, StatsSnapshot, TimeoutHandle,
};
pub use error::{BridgeError, BridgeResult, StoreError};
pub use ports::{BridgeApi, BridgeOutcome, CorrelationStore, TimeoutCallback, TimeoutScheduler};
pub use service::{ExchangeRouter, ExchangeRouterBuilder};
