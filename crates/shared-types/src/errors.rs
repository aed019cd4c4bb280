//! # Error Types
//!
//! Error causes carried inside exchanges, and errors raised by the exchange
//! model itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exchange::{ExchangeId, ExchangeStatus};

/// Why an exchange ended in `Error` status.
///
/// This travels with the exchange (it is data, not a Rust error returned
/// from a call), so it is serializable and cloneable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorCause {
    /// No response arrived before the correlation deadline.
    #[error("no response received within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A fault came back on a bridge that does not propagate faults.
    #[error("fault received on a non-robust bridge leg")]
    UnexpectedFault,

    /// The bridged leg reported an error.
    #[error("remote error: {message}")]
    Remote { message: String },

    /// The router shut down while the exchange was still pending.
    #[error("router shut down before the exchange resolved")]
    Shutdown,
}

/// Errors from status transitions on an [`crate::Exchange`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The exchange already reached a terminal status.
    #[error("exchange {id} is already {status:?}")]
    AlreadyTerminal {
        id: ExchangeId,
        status: ExchangeStatus,
    },
}
