//! # Exchange Envelope
//!
//! One unit of work in flight on the bus.
//!
//! ## Status Lifecycle
//!
//! ```text
//!            complete()
//! [ACTIVE] ─────────────→ [DONE]
//!    │  ↻ set_fault()
//!    │
//!    └──────fail()──────→ [ERROR]
//! ```
//!
//! A fault is not a status of its own: it rides on an `Active` exchange
//! until the receiver acknowledges it (`Done`) or escalates it (`Error`).

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{ErrorCause, TransitionError};

/// Opaque, unique exchange identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Generate a fresh random identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ExchangeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which side of a conversation created the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Started by a consumer asking for work to be done.
    Initiator,
    /// Created on behalf of a responding side (e.g. a bridge leg).
    Responder,
}

/// Exchange status. `Done` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Active,
    Done,
    Error,
}

impl ExchangeStatus {
    /// Whether this status can never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExchangeStatus::Active)
    }
}

/// Message exchange pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// Fire and forget; only DONE/ERROR come back.
    OneWay,
    /// A response payload is expected.
    RequestResponse,
    /// One-way, but the receiver may answer with a fault.
    RobustOneWay,
}

impl Pattern {
    /// Whether the pattern expects a data-bearing response.
    #[must_use]
    pub fn expects_response(self) -> bool {
        matches!(self, Pattern::RequestResponse)
    }
}

/// The exchange envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    id: ExchangeId,
    role: Role,
    status: ExchangeStatus,
    pattern: Pattern,
    /// Target endpoint the exchange is addressed to, if any.
    service: Option<String>,
    payload: Option<Bytes>,
    fault: Option<Bytes>,
    error: Option<ErrorCause>,
    properties: BTreeMap<String, serde_json::Value>,
}

impl Exchange {
    /// Create an `Active` exchange with a generated id.
    #[must_use]
    pub fn new(role: Role, pattern: Pattern) -> Self {
        Self {
            id: ExchangeId::generate(),
            role,
            status: ExchangeStatus::Active,
            pattern,
            service: None,
            payload: None,
            fault: None,
            error: None,
            properties: BTreeMap::new(),
        }
    }

    /// Shorthand for a consumer-created exchange.
    #[must_use]
    pub fn initiator(pattern: Pattern) -> Self {
        Self::new(Role::Initiator, pattern)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<ExchangeId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &ExchangeId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> ExchangeStatus {
        self.status
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn fault(&self) -> Option<&Bytes> {
        self.fault.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorCause> {
        self.error.as_ref()
    }

    pub fn properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.properties
    }

    /// Whether the exchange has reached `Done` or `Error`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// An `Active` exchange carrying a fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.status == ExchangeStatus::Active && self.fault.is_some()
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }

    /// String-valued property lookup; non-string values yield `None`.
    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(serde_json::Value::as_str)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Replace the payload. Allowed only while `Active`.
    pub fn set_payload(&mut self, payload: Option<Bytes>) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.payload = payload;
        Ok(())
    }

    /// Attach a fault. The exchange stays `Active`.
    pub fn set_fault(&mut self, fault: Bytes) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.fault = Some(fault);
        Ok(())
    }

    /// Transition `Active -> Done`.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.status = ExchangeStatus::Done;
        Ok(())
    }

    /// Transition `Active -> Error` with the given cause.
    pub fn fail(&mut self, cause: ErrorCause) -> Result<(), TransitionError> {
        self.ensure_active()?;
        self.status = ExchangeStatus::Error;
        self.error = Some(cause);
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}
