//! Structured logging helpers.
//!
//! Exchange log lines carry a consistent set of fields so they can be
//! grepped and aggregated:
//! - `exchange_id`: exchange identifier
//! - `status`: exchange status
//! - `pattern`: exchange pattern
//! - `correlation_id`: correlation key, where one applies

/// Log an exchange-related event with standard fields.
///
/// ```rust,ignore
/// log_exchange_event!(debug, "Leg dispatched", leg, correlation_id = %corr);
/// ```
#[macro_export]
macro_rules! log_exchange_event {
    ($level:ident, $msg:literal, $exchange:expr $(, $($field:tt)*)?) => {{
        let exchange = &$exchange;
        $crate::tracing::$level!(
            exchange_id = %exchange.id(),
            status = ?exchange.status(),
            pattern = ?exchange.pattern(),
            $($($field)*,)?
            $msg
        )
    }};
}

/// Log a correlation-related event with standard fields.
///
/// ```rust,ignore
/// log_correlation_event!(debug, "Signal discarded", correlation_id);
/// ```
#[macro_export]
macro_rules! log_correlation_event {
    ($level:ident, $msg:literal, $correlation_id:expr $(, $($field:tt)*)?) => {
        $crate::tracing::$level!(
            correlation_id = %$correlation_id,
            $($($field)*,)?
            $msg
        )
    };
}
