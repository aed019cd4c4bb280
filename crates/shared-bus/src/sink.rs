//! # Delivery Sink
//!
//! The outbound boundary of the bus: "hand this exchange to its destination".

use async_trait::async_trait;
use shared_types::{Exchange, ExchangeId};
use thiserror::Error;

/// Errors from handing an exchange to its destination.
///
/// Retrying is the sink's business; callers surface these as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Nobody is listening for this exchange.
    #[error("no route for exchange {exchange_id}")]
    NoRoute { exchange_id: ExchangeId },

    /// The destination refused the exchange.
    #[error("exchange {exchange_id} rejected: {reason}")]
    Rejected {
        exchange_id: ExchangeId,
        reason: String,
    },

    /// The sink has shut down.
    #[error("delivery channel closed")]
    Closed,
}

/// Trait for delivering exchanges.
///
/// Implementations may apply backpressure by awaiting inside `send`.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver an exchange.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if the exchange could not be handed off.
    async fn send(&self, exchange: Exchange) -> Result<(), DeliveryError>;
}
