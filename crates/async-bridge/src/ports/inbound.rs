//! Driving Ports (API - Inbound)
//!
//! Called by the transport layer whenever it delivers an exchange addressed
//! to the bridge, and by the timeout scheduler when a timer fires.

use crate::domain::CorrelationId;
use crate::error::BridgeResult;
use async_trait::async_trait;
use shared_types::{Exchange, ExchangeId, ExchangeStatus};

/// What an inbound call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// A correlation was registered and its request leg sent.
    Dispatched {
        correlation_id: CorrelationId,
        leg_id: ExchangeId,
    },
    /// The request leg acknowledged DONE; still waiting for the response.
    RequestAcknowledged { correlation_id: CorrelationId },
    /// The initiator was forwarded with this status.
    ///
    /// `Active` means it carries a propagated fault.
    Resolved {
        correlation_id: CorrelationId,
        initiator_id: ExchangeId,
        status: ExchangeStatus,
    },
    /// The correlation was no longer pending; nothing happened.
    Discarded { correlation_id: CorrelationId },
}

impl BridgeOutcome {
    pub fn correlation_id(&self) -> &CorrelationId {
        match self {
            BridgeOutcome::Dispatched { correlation_id, .. }
            | BridgeOutcome::RequestAcknowledged { correlation_id }
            | BridgeOutcome::Resolved { correlation_id, .. }
            | BridgeOutcome::Discarded { correlation_id } => correlation_id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, BridgeOutcome::Resolved { .. })
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, BridgeOutcome::Discarded { .. })
    }
}

/// Primary bridge API
///
/// Safe to call concurrently from any number of tasks. Signals for a
/// correlation that is no longer pending return [`BridgeOutcome::Discarded`]
/// rather than an error.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Register an `Active` initiator and dispatch its request leg.
    ///
    /// # Errors
    ///
    /// - `InvalidExchange` if the exchange is not an active initiator
    /// - `MissingCorrelationId` if no correlation id can be derived
    /// - `DuplicateCorrelation` if the id is already pending
    /// - `Delivery` if the leg could not be sent (the registration is rolled back)
    async fn accept_initiator(&self, exchange: Exchange) -> BridgeResult<BridgeOutcome>;

    /// Resolve the initiator with a data-bearing response.
    ///
    /// # Errors
    ///
    /// - `MissingCorrelationId` if the response carries no correlation id
    /// - `Delivery` if the resolved initiator could not be forwarded
    async fn accept_bridge_response(&self, exchange: Exchange) -> BridgeResult<BridgeOutcome>;

    /// Handle the request leg completing (DONE, ERROR, or a fault).
    ///
    /// # Errors
    ///
    /// - `InvalidExchange` if the leg is `Active` without a fault
    /// - `MissingCorrelationId` if the leg carries no correlation id
    /// - `Delivery` if a resolved initiator could not be forwarded
    async fn accept_bridge_terminal(&self, exchange: Exchange) -> BridgeResult<BridgeOutcome>;

    /// Fail the initiator with a timeout, if still pending.
    ///
    /// # Errors
    ///
    /// - `Delivery` if the failed initiator could not be forwarded
    async fn on_timeout(&self, correlation_id: &CorrelationId) -> BridgeResult<BridgeOutcome>;
}
