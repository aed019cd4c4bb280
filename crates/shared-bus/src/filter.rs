//! # Exchange Filters
//!
//! Subscription filters for the in-memory exchange bus.

use shared_types::{Exchange, ExchangeStatus, Role};

/// Filter for subscribing to a subset of exchanges.
///
/// Empty criteria match everything; non-empty criteria must all match.
#[derive(Debug, Clone, Default)]
pub struct ExchangeFilter {
    /// Target services to match (empty = all).
    pub services: Vec<String>,
    /// Roles to match (empty = all).
    pub roles: Vec<Role>,
    /// Statuses to match (empty = all).
    pub statuses: Vec<ExchangeStatus>,
}

impl ExchangeFilter {
    /// Create a filter that accepts all exchanges.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for exchanges addressed to a service.
    #[must_use]
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            services: vec![name.into()],
            ..Self::default()
        }
    }

    /// Create a filter for exchanges with one of the given roles.
    #[must_use]
    pub fn roles(roles: Vec<Role>) -> Self {
        Self {
            roles,
            ..Self::default()
        }
    }

    /// Narrow the filter to the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: Vec<ExchangeStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Check if an exchange matches this filter.
    #[must_use]
    pub fn matches(&self, exchange: &Exchange) -> bool {
        let service_match = self.services.is_empty()
            || exchange
                .service()
                .is_some_and(|s| self.services.iter().any(|want| want == s));

        let role_match = self.roles.is_empty() || self.roles.contains(&exchange.role());

        let status_match = self.statuses.is_empty() || self.statuses.contains(&exchange.status());

        service_match && role_match && status_match
    }
}
