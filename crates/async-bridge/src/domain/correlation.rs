//! Correlation ID and the strategies that derive it from an exchange.
//!
//! The request side and the response side are derived independently: by
//! default the initiator's exchange id keys the correlation, and bridge legs
//! carry that key back in a message property.

use serde::{Deserialize, Serialize};
use shared_types::{Exchange, ExchangeId};
use std::fmt;

/// Key linking an initiator exchange to its bridge legs.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Create a correlation id; `None` if `id` is empty.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Derive from an exchange id.
    pub fn from_exchange_id(id: &ExchangeId) -> Option<Self> {
        Self::new(id.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strategy for reading a correlation id off an exchange.
pub trait CorrelationExtractor: Send + Sync {
    /// `None` means the exchange carries no usable id.
    fn extract(&self, exchange: &Exchange) -> Option<CorrelationId>;
}

impl<F> CorrelationExtractor for F
where
    F: Fn(&Exchange) -> Option<CorrelationId> + Send + Sync,
{
    fn extract(&self, exchange: &Exchange) -> Option<CorrelationId> {
        self(exchange)
    }
}

/// Uses the exchange id itself. Default for initiators.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeIdExtractor;

impl CorrelationExtractor for ExchangeIdExtractor {
    fn extract(&self, exchange: &Exchange) -> Option<CorrelationId> {
        CorrelationId::from_exchange_id(exchange.id())
    }
}

/// Reads a string property. Default for bridge legs and responses.
#[derive(Debug, Clone)]
pub struct PropertyExtractor {
    property: String,
}

impl PropertyExtractor {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }
}

impl CorrelationExtractor for PropertyExtractor {
    fn extract(&self, exchange: &Exchange) -> Option<CorrelationId> {
        exchange
            .property_str(&self.property)
            .and_then(CorrelationId::new)
    }
}
