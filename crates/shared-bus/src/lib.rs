//! # Shared Bus - Exchange Delivery Boundary
//!
//! Everything that moves an [`Exchange`](shared_types::Exchange) from one
//! party to another goes through a [`DeliverySink`]. Real transports (HTTP,
//! JMS, SOAP) implement it outside this workspace; this crate ships the trait
//! and two in-process implementations.
//!
//! ```text
//! ┌──────────────┐                     ┌──────────────┐
//! │  Router      │    send()           │  Transport   │
//! │              │ ──────┐             │  / Endpoint  │
//! └──────────────┘       │             └──────────────┘
//!                        ▼                     ↑
//!                 ┌──────────────┐             │
//!                 │ Exchange Bus │ ────────────┘
//!                 │              │  subscribe(filter)
//!                 └──────────────┘
//! ```
//!
//! - [`InMemoryExchangeBus`]: broadcast bus with filtered subscriptions.
//! - [`RecordingSink`]: records every delivery; can be told to fail.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod filter;
pub mod publisher;
pub mod recording;
pub mod sink;
pub mod subscriber;

// Re-export main types
pub use filter::ExchangeFilter;
pub use publisher::InMemoryExchangeBus;
pub use recording::RecordingSink;
pub use sink::{DeliveryError, DeliverySink};
pub use subscriber::{ExchangeStream, Subscription, SubscriptionError};

/// Maximum exchanges to buffer per subscriber before the slowest lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
