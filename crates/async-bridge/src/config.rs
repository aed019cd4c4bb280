//! Bridge configuration
//!
//! Loaded from the `[bridge]` table of the runtime's TOML file. Durations are
//! written as `"250ms"`, `"5s"`, `"2m"` or bare seconds.

use serde::{Deserialize, Serialize};
use shared_types::Pattern;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub use humantime_serde::parse_duration;

/// Default property carrying the correlation id on bridge legs.
pub const DEFAULT_CORRELATION_PROPERTY: &str = "corr";

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Time allowed for a correlation to resolve. Zero disables timeouts.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Leg pattern and fault handling.
    pub mode: BridgeMode,
    /// When the timeout starts counting.
    pub timeout_start: TimeoutStart,
    /// Property that carries the correlation id on legs and responses.
    pub correlation_property: String,
    /// Service stamped on request legs.
    pub target_service: Option<String>,
    /// Expiry sweep period. Zero disables the sweeper.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            mode: BridgeMode::OneWay,
            timeout_start: TimeoutStart::OnAccept,
            correlation_property: DEFAULT_CORRELATION_PROPERTY.to_string(),
            target_service: None,
            sweep_interval: Duration::ZERO,
        }
    }
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.correlation_property.trim().is_empty() {
            return Err(ConfigError::EmptyCorrelationProperty);
        }

        // Nothing would ever carry a deadline
        if !self.sweep_interval.is_zero() && self.timeout.is_zero() {
            return Err(ConfigError::SweepWithoutTimeout);
        }

        if self.timeout_start == TimeoutStart::OnRequestSent && self.timeout.is_zero() {
            return Err(ConfigError::RequestSentWithoutTimeout);
        }

        Ok(())
    }

    pub fn timeouts_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BridgeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_timeout_start(mut self, timeout_start: TimeoutStart) -> Self {
        self.timeout_start = timeout_start;
        self
    }

    #[must_use]
    pub fn with_target_service(mut self, service: impl Into<String>) -> Self {
        self.target_service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_correlation_property(mut self, property: impl Into<String>) -> Self {
        self.correlation_property = property.into();
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Bridge semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BridgeMode {
    /// Legs are one-way; a fault on a leg fails the initiator.
    #[default]
    OneWay,
    /// Legs are robust one-way; faults propagate to the initiator as faults.
    Robust,
}

impl BridgeMode {
    /// Pattern of the request legs sent in this mode.
    pub fn leg_pattern(self) -> Pattern {
        match self {
            BridgeMode::OneWay => Pattern::OneWay,
            BridgeMode::Robust => Pattern::RobustOneWay,
        }
    }

    pub fn propagates_faults(self) -> bool {
        self == BridgeMode::Robust
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BridgeMode::OneWay => "one-way",
            BridgeMode::Robust => "robust",
        }
    }
}

impl FromStr for BridgeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one-way" | "oneway" | "one_way" => Ok(BridgeMode::OneWay),
            "robust" | "robust-one-way" => Ok(BridgeMode::Robust),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

/// When the per-correlation timer is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutStart {
    /// When the initiator is accepted.
    #[default]
    OnAccept,
    /// When the request leg first acknowledges DONE.
    OnRequestSent,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("correlation_property cannot be empty")]
    EmptyCorrelationProperty,

    #[error("sweep_interval requires a non-zero timeout")]
    SweepWithoutTimeout,

    #[error("timeout_start = on-request-sent requires a non-zero timeout")]
    RequestSentWithoutTimeout,

    #[error("invalid bridge mode: {0}")]
    InvalidMode(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

/// Duration (de)serialization as `"250ms"`, `"5s"`, `"2m"` or bare seconds.
///
/// Use with `#[serde(with = "async_bridge::config::humantime_serde")]`.
pub mod humantime_serde {
    use super::ConfigError;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_nanos() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Parse a duration string.
    pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
        let s = s.trim();
        let invalid = || ConfigError::InvalidDuration(s.to_string());
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| invalid())
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| invalid())
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or_else(invalid)
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| invalid())
        }
    }
}
