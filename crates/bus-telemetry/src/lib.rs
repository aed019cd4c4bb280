//! # Bus Telemetry
//!
//! Logging setup shared by every binary in the workspace.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bus_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BUS_SERVICE_NAME` | `exchange-bridge` | Service name in logs |
//! | `BUS_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `BUS_JSON_LOGS` | `false` | JSON output |
//! | `BUS_CONSOLE_OUTPUT` | `true` | Console output |

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{env_filter, init_tracing};

// Re-exported for the logging macros.
#[doc(hidden)]
pub use tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging.
///
/// Returns a guard to hold for the lifetime of the application; dropping it
/// logs the shutdown.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    init_tracing(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that marks the telemetry lifetime.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for creating a span with component context.
///
/// ```rust,ignore
/// let _span = component_span!("dispatch", component = "async-bridge");
/// ```
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        $crate::tracing::info_span!($name, $($field)*)
    };
}
