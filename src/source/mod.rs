//! Fetcher abstraction layer.
//!
//! This module defines the [`Fetcher`] trait, the [`FetchResult`] one attempt
//! produces, and the common [`Item`] type.  Concrete fetchers live in
//! sub-modules (currently only [`rss`]).
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `atom.rs`).
//! 2. Define a struct (e.g. `AtomFetcher`) and implement [`Fetcher`] for it.
//! 3. Add `mod atom;` below and re-export your struct in the `pub use` block.
//! 4. Hand an instance to [`subscribe`](crate::subscribe).
//!
//! Scheduling, retries, de-duplication and backpressure are all handled by
//! the subscription; a fetcher only performs one attempt per call.

mod item;
mod rss;

pub use item::Item;
pub use rss::RssFetcher;

use std::time::Duration;

use tokio::time::Instant;

use crate::error::FetchError;

/// Roughly 30 years; stands in for "never" when a delay overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `delay` from now, saturating at a far-future instant instead
/// of panicking when the addition overflows.
pub fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Everything one fetch attempt produced.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Items in feed order.  Ignored when `error` is set.
    pub items: Vec<Item>,
    /// Earliest instant at which the next attempt may start.
    pub next: Instant,
    /// Set when the attempt failed.
    pub error: Option<FetchError>,
}

impl FetchResult {
    /// A successful attempt.
    pub fn ok(items: Vec<Item>, next: Instant) -> Self {
        Self {
            items,
            next,
            error: None,
        }
    }

    /// A failed attempt.  The subscription overrides `next` with its own
    /// retry delay.
    pub fn failed(error: FetchError, next: Instant) -> Self {
        Self {
            items: Vec::new(),
            next,
            error: Some(error),
        }
    }
}

/// Trait that every data source must implement.
///
/// A subscription calls [`fetch()`](Fetcher::fetch) on tokio's blocking pool,
/// never on its own control loop, so implementations may block for as long
/// as the network takes.  At most one call is outstanding per subscription.
///
/// ## Implementing a new source
///
/// ```ignore
/// pub struct MyFetcher { /* config fields */ }
///
/// impl Fetcher for MyFetcher {
///     fn name(&self) -> &str { "my-source" }
///
///     fn fetch(&self) -> FetchResult {
///         // Perform HTTP / IO, then convert into Item values.
///         todo!()
///     }
/// }
/// ```
pub trait Fetcher: Send + Sync + 'static {
    /// Human-readable label, used in logs.
    fn name(&self) -> &str;

    /// Perform one fetch attempt.
    fn fetch(&self) -> FetchResult;
}
