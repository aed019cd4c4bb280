//! Ports: the router's API and the services it drives.

pub mod inbound;
pub mod outbound;

pub use inbound::{BridgeApi, BridgeOutcome};
pub use outbound::{CorrelationStore, TimeoutCallback, TimeoutScheduler};
