//! Domain layer: correlation keys, pending state, and how a bridged leg's
//! outcome lands on the initiator.

pub mod correlation;
pub mod pending;
pub mod resolution;

pub use correlation::{CorrelationExtractor, CorrelationId, ExchangeIdExtractor, PropertyExtractor};
pub use pending::{BridgeStats, PendingCorrelation, StatsSnapshot, TimeoutHandle};
pub use resolution::Resolution;
