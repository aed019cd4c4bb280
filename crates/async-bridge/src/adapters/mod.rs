//! Adapters: in-process implementations of the outbound ports.

pub mod memory_store;
pub mod tokio_scheduler;

pub use memory_store::InMemoryCorrelationStore;
pub use tokio_scheduler::TokioTimeoutScheduler;
