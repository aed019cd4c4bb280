//! How a bridge outcome lands on the initiator.

use bytes::Bytes;
use shared_types::{ErrorCause, Exchange, ExchangeStatus, TransitionError};

/// Outcome applied to a pending initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Complete with this payload (`None` keeps the initiator's own).
    Payload(Option<Bytes>),
    /// Propagate a fault; the initiator stays `Active`.
    Fault(Bytes),
    /// Fail with this cause.
    Error(ErrorCause),
}

impl Resolution {
    /// Derive the outcome carried by a bridged exchange.
    ///
    /// An error always wins. A fault propagates as a fault only when
    /// `propagate_faults` is set; otherwise it fails the initiator.
    pub fn from_leg(leg: &Exchange, propagate_faults: bool) -> Self {
        if leg.status() == ExchangeStatus::Error || leg.error().is_some() {
            let cause = leg.error().cloned().unwrap_or_else(|| ErrorCause::Remote {
                message: format!("bridged exchange {} ended in error", leg.id()),
            });
            return Resolution::Error(cause);
        }
        match leg.fault() {
            Some(fault) if propagate_faults => Resolution::Fault(fault.clone()),
            Some(_) => Resolution::Error(ErrorCause::UnexpectedFault),
            None => Resolution::Payload(leg.payload().cloned()),
        }
    }

    /// Apply to the initiator.
    pub fn apply(self, initiator: &mut Exchange) -> Result<(), TransitionError> {
        match self {
            Resolution::Payload(Some(payload)) => {
                initiator.set_payload(Some(payload))?;
                initiator.complete()
            }
            Resolution::Payload(None) => initiator.complete(),
            Resolution::Fault(fault) => initiator.set_fault(fault),
            Resolution::Error(cause) => initiator.fail(cause),
        }
    }
}
