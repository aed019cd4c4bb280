//! # Exchange Subscriber
//!
//! The receiving side of the in-memory exchange bus.

use crate::filter::ExchangeFilter;
use shared_types::Exchange;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Exchange bus closed")]
    Closed,
}

/// A subscription handle for receiving exchanges.
///
/// Dropping it unsubscribes from the bus.
pub struct Subscription {
    receiver: broadcast::Receiver<Exchange>,
    filter: ExchangeFilter,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Exchange>,
        filter: ExchangeFilter,
    ) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next exchange that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(exchange)` - The next matching exchange
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<Exchange> {
        loop {
            let exchange = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some exchanges dropped");
                    continue;
                }
            };

            if self.filter.matches(&exchange) {
                return Some(exchange);
            }
        }
    }

    /// Try to receive the next exchange without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(exchange))` - An exchange was available and matched
    /// - `Ok(None)` - Nothing available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<Exchange>, SubscriptionError> {
        loop {
            let exchange = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&exchange) {
                return Ok(Some(exchange));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn exchange_filter(&self) -> &ExchangeFilter {
        &self.filter
    }
}

/// A `Stream` of exchanges matching a filter.
pub struct ExchangeStream {
    inner: BroadcastStream<Exchange>,
    filter: ExchangeFilter,
}

impl ExchangeStream {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Exchange>,
        filter: ExchangeFilter,
    ) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    /// Get the filter for this stream.
    ///
    /// Not named `filter`, which would be shadowed by `StreamExt::filter`.
    #[must_use]
    pub fn exchange_filter(&self) -> &ExchangeFilter {
        &self.filter
    }
}

impl Stream for ExchangeStream {
    type Item = Exchange;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(exchange))) => {
                    if this.filter.matches(&exchange) {
                        return Poll::Ready(Some(exchange));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream lagged, some exchanges dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
