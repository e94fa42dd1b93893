//! feedmux: live, de-duplicated item streams from polled RSS feeds.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌─────────┐ fetch() ┌──────────────┐  Item   ┌─────────┐  Item   ┌──────────┐
//! │ Fetcher │ ◄────── │ Subscription │ ──────► │ merge() │ ──────► │ consumer │
//! └─────────┘         └──────────────┘         └─────────┘         └──────────┘
//!                        (one per feed)             ▲                   │
//!                                                   └──── close() ──────┘
//! ```
//!
//! * **`source`**: the [`Fetcher`] trait, [`Item`], and the RSS fetcher.
//! * **`subscription`**: [`subscribe`]: one polling loop per fetcher with
//!   de-duplication, bounded buffering and synchronous close.
//! * **`merge`**: [`merge`]: N subscriptions in, one subscription out.
//! * **`config`**: optional TOML configuration.
//! * **`error`**: fetch and close errors.
//!
//! ```ignore
//! let mut feed = merge([
//!     subscribe(RssFetcher::new("https://example.com/a.xml", "A")),
//!     subscribe(RssFetcher::new("https://example.com/b.xml", "B")),
//! ]);
//! while let Some(item) = feed.next().await {
//!     println!("{}: {}", item.channel, item.title);
//! }
//! feed.close().await?;
//! ```

pub mod config;
pub mod error;
pub mod merge;
pub mod source;
pub mod subscription;

pub use config::{Config, ConfigError, FeedConfig};
pub use error::{FetchError, SubscriptionError};
pub use merge::merge;
pub use source::{deadline_after, FetchResult, Fetcher, Item, RssFetcher};
pub use subscription::{subscribe, subscribe_with, Subscription, SubscriptionConfig, MAX_PENDING};
