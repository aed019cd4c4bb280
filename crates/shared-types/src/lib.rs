//! # Shared Types Crate
//!
//! This crate contains the `Exchange` envelope that flows through the bus and
//! the error causes it can carry.
//!
//! ## Design Principles
//!
//! - **Single Exchange Type**: One-way, robust one-way and request/response
//!   exchanges are one struct tagged with a [`Pattern`], never separate types.
//! - **Monotonic Status**: Once an exchange leaves `Active` it is terminal.
//!   Status only changes through [`Exchange::complete`], [`Exchange::fail`]
//!   and [`Exchange::set_fault`], which enforce this.
//! - **Opaque Payloads**: Payloads and faults are raw bytes; marshaling is the
//!   business of transports, not of the bus.

pub mod errors;
pub mod exchange;

pub use errors::*;
pub use exchange::*;
