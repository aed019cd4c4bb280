//! # Integration Tests
//!
//! The router wired to the in-memory exchange bus, with a simulated
//! transport answering request legs.

pub mod races;
pub mod scenarios;
