//! # Exchange-Bridge Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── router_benchmarks.rs   # Criterion benchmarks for the router
//! └── src/integration/
//!     ├── scenarios.rs           # Router + exchange bus + simulated transport
//!     └── races.rs               # Concurrent signals and generated sequences
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bridge-tests
//!
//! # By category
//! cargo test -p bridge-tests integration::scenarios::
//! cargo test -p bridge-tests integration::races::
//!
//! # Benchmarks
//! cargo bench -p bridge-tests
//! ```

pub mod integration;
