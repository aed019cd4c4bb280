//! # Runtime Configuration
//!
//! One TOML file with a table per concern. Every key is optional.
//!
//! ```toml
//! [bridge]
//! timeout = "5s"
//! mode = "robust"
//! target_service = "loopback"
//!
//! [bus]
//! capacity = 1000
//!
//! [loopback]
//! latency = "5ms"
//! drop_rate = 0.01
//!
//! [batch]
//! requests = 1000
//! concurrency = 64
//! ```
//!
//! Environment overrides: `BRIDGE_TIMEOUT`, `BRIDGE_MODE`, plus the
//! telemetry variables read by [`TelemetryConfig::with_env_overrides`].

use async_bridge::{parse_duration, BridgeConfig, BridgeMode};
use bus_telemetry::TelemetryConfig;
use rand::Rng;
use serde::Deserialize;
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Service name the loopback target answers to by default.
pub const DEFAULT_TARGET_SERVICE: &str = "loopback";

/// Complete runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Router configuration.
    pub bridge: BridgeConfig,
    /// Exchange bus configuration.
    pub bus: BusConfig,
    /// Loopback target behavior.
    pub loopback: LoopbackConfig,
    /// Request batch driven through the bridge.
    pub batch: BatchConfig,
    /// Logging.
    pub telemetry: TelemetryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default()
                .with_timeout(Duration::from_secs(5))
                .with_target_service(DEFAULT_TARGET_SERVICE),
            bus: BusConfig::default(),
            loopback: LoopbackConfig::default(),
            batch: BatchConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `BRIDGE_TIMEOUT`, `BRIDGE_MODE` and the telemetry variables.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(timeout) = std::env::var("BRIDGE_TIMEOUT") {
            self.bridge.timeout = parse_duration(&timeout)?;
        }
        if let Ok(mode) = std::env::var("BRIDGE_MODE") {
            self.bridge.mode = mode.parse::<BridgeMode>()?;
        }
        self.telemetry = self.telemetry.with_env_overrides();
        Ok(self)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bridge.validate()?;

        if self.bus.capacity == 0 {
            return Err(ConfigError::Invalid("bus.capacity cannot be 0"));
        }

        for (name, value) in [
            ("loopback.fault_rate", self.loopback.fault_rate),
            ("loopback.error_rate", self.loopback.error_rate),
            ("loopback.drop_rate", self.loopback.drop_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        if self.loopback.fault_rate + self.loopback.error_rate > 1.0 {
            return Err(ConfigError::Invalid(
                "loopback.fault_rate + loopback.error_rate cannot exceed 1",
            ));
        }

        if self.batch.concurrency == 0 {
            return Err(ConfigError::Invalid("batch.concurrency cannot be 0"));
        }
        if self.batch.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid("batch.idle_timeout cannot be 0"));
        }

        Ok(())
    }
}

/// Exchange bus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Broadcast buffer per subscriber.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// How the loopback target answers request legs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Delay between acknowledging a leg and sending its response.
    #[serde(with = "async_bridge::config::humantime_serde")]
    pub latency: Duration,
    /// Share of legs answered with a fault.
    pub fault_rate: f64,
    /// Share of legs answered with ERROR.
    pub error_rate: f64,
    /// Share of acknowledged legs whose response is never sent.
    pub drop_rate: f64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(5),
            fault_rate: 0.0,
            error_rate: 0.0,
            drop_rate: 0.0,
        }
    }
}

/// How the loopback target answers one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegReply {
    /// Acknowledge DONE, then respond after the latency.
    Respond,
    /// Acknowledge DONE and never respond.
    Drop,
    Fault,
    Error,
}

impl LoopbackConfig {
    /// Roll the reply for one leg.
    pub fn choose<R: Rng>(&self, rng: &mut R) -> LegReply {
        let roll: f64 = rng.gen();
        if roll < self.fault_rate {
            LegReply::Fault
        } else if roll < self.fault_rate + self.error_rate {
            LegReply::Error
        } else if rng.gen_bool(self.drop_rate) {
            LegReply::Drop
        } else {
            LegReply::Respond
        }
    }
}

/// Request batch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Initiators to submit.
    pub requests: usize,
    /// Correlations allowed in flight at once.
    pub concurrency: usize,
    /// Give up when no initiator completes for this long.
    #[serde(with = "async_bridge::config::humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            concurrency: 16,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Bridge(#[from] async_bridge::ConfigError),

    #[error("{name} must be within 0..=1, got {value}")]
    InvalidRate { name: &'static str, value: f64 },

    #[error("{0}")]
    Invalid(&'static str),
}
