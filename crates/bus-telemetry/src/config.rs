//! Telemetry configuration from environment variables.

use serde::Deserialize;
use std::env;

/// Configuration for logging output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `async_bridge=debug,info`
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "exchange-bridge".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BUS_SERVICE_NAME`: Service name (default: exchange-bridge)
    /// - `BUS_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `BUS_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `BUS_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of an existing configuration.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("BUS_SERVICE_NAME").unwrap_or(self.service_name),

            log_level: env::var("BUS_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(self.log_level),

            console_output: env::var("BUS_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(self.console_output),

            json_logs: env::var("BUS_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(self.json_logs || is_container),
        }
    }

    /// Configuration for a named component.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("{}-{}", config.service_name, component);
        config
    }
}
