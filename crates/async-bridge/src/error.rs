//! Error types for the correlation core
//!
//! Only true errors live here. A correlation that was already resolved when a
//! late signal arrives is not an error: the router reports it as
//! [`BridgeOutcome::Discarded`](crate::ports::inbound::BridgeOutcome).

use crate::domain::CorrelationId;
use shared_bus::DeliveryError;
use shared_types::{ExchangeId, TransitionError};
use thiserror::Error;

/// Correlation store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An unresolved entry already exists under this id.
    #[error("correlation {correlation_id} is already registered")]
    Duplicate { correlation_id: CorrelationId },

    /// No entry under this id (resolved, timed out, or never registered).
    #[error("correlation {correlation_id} not found")]
    NotFound { correlation_id: CorrelationId },

    /// Backend failure (persistent stores only).
    #[error("correlation store backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced to callers of the router
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A prior unresolved exchange shares the correlation id.
    ///
    /// Points at a correlation-id derivation bug; never retried.
    #[error("duplicate correlation id {correlation_id}")]
    DuplicateCorrelation { correlation_id: CorrelationId },

    /// The exchange carries no usable correlation id.
    #[error("exchange {exchange_id} carries no correlation id")]
    MissingCorrelationId { exchange_id: ExchangeId },

    /// The exchange is not valid for the operation it was handed to.
    #[error("exchange {exchange_id} rejected: {reason}")]
    InvalidExchange {
        exchange_id: ExchangeId,
        reason: &'static str,
    },

    /// A status transition on the initiator was refused.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The delivery sink failed; the router does not retry.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The correlation store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The router has been shut down.
    #[error("router is shut down")]
    Closed,
}

impl From<StoreError> for BridgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { correlation_id } => {
                BridgeError::DuplicateCorrelation { correlation_id }
            }
            other => BridgeError::Store(other.to_string()),
        }
    }
}

/// Result type for router operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_bridge_error() {
        let id = CorrelationId::new("E1").unwrap();
        let err: BridgeError = StoreError::Duplicate {
            correlation_id: id.clone(),
        }
        .into();
        assert!(matches!(
            err,
            BridgeError::DuplicateCorrelation { correlation_id } if correlation_id == id
        ));
    }

    #[test]
    fn test_backend_maps_to_store_error() {
        let err: BridgeError = StoreError::Backend("disk full".into()).into();
        assert_eq!(
            err.to_string(),
            "store error: correlation store backend failure: disk full"
        );
    }

    #[test]
    fn test_delivery_error_is_transparent() {
        let err: BridgeError = DeliveryError::Closed.into();
        assert_eq!(err.to_string(), "delivery channel closed");
    }
}
