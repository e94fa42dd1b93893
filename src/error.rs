//! Error types for fetching and subscription lifecycle.
//!
//! Fetch failures never interrupt an item stream.  They are recorded by the
//! owning subscription, retried after a fixed delay, and surfaced only from
//! [`Subscription::close`](crate::Subscription::close).

use thiserror::Error;

/// A single failed fetch attempt.
///
/// Payloads are stored as strings so the error can be cloned and compared
/// in tests, independent of the transport that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(String),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Body could not be parsed as a feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// The fetcher panicked on the blocking pool
    #[error("Fetcher panicked: {0}")]
    Panicked(String),
    /// Anything else a custom fetcher wants to report
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchError::HttpStatus(status.as_u16()),
            None => FetchError::Network(e.to_string()),
        }
    }
}

impl From<rss::Error> for FetchError {
    fn from(e: rss::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// Outcome of closing a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The most recent fetch attempt failed.
    #[error("Last fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// More than one merged child reported a failure, in child order.
    #[error("{} merged subscriptions failed", .0.len())]
    Multiple(Vec<SubscriptionError>),

    /// `close()` was called on a subscription that is already closed.
    #[error("Subscription already closed")]
    AlreadyClosed,

    /// The subscription's task stopped without answering the close request.
    #[error("Subscription task terminated unexpectedly")]
    Terminated,
}

impl SubscriptionError {
    /// Folds per-child close failures into a single outcome.
    ///
    /// No failures is `Ok`, one failure is returned as-is, several are
    /// wrapped in [`SubscriptionError::Multiple`] keeping their order.
    pub fn aggregate(mut failures: Vec<SubscriptionError>) -> Result<()> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(SubscriptionError::Multiple(failures)),
        }
    }
}

pub type Result<T, E = SubscriptionError> = std::result::Result<T, E>;
