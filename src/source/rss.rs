//! RSS feed fetcher implementation.
//!
//! This module shows how to implement the [`Fetcher`] trait for a concrete
//! feed format.  Use it as a template when adding support for Atom, JSON Feed,
//! or any other format.
//!
//! The RSS implementation below is a complete worked example.

use std::time::Duration;

use super::{deadline_after, FetchResult, Fetcher, Item};
use crate::error::FetchError;

/// Default delay between two successful polls of the same feed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default bound on one HTTP request, connect to last byte.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// An RSS feed fetcher.
///
/// Fetches and parses an RSS 2.0 feed over HTTP using the [`rss`] crate.
pub struct RssFetcher {
    /// The feed URL to poll.
    pub url: String,
    /// A human-readable label, stored as each item's channel.
    pub label: String,
    /// How long to wait after a successful fetch.
    pub poll_interval: Duration,
    /// Upper bound on a single request.
    pub timeout: Duration,
}

impl RssFetcher {
    /// Create a new RSS fetcher.
    ///
    /// # Arguments
    ///
    /// * `url`: full URL of the RSS feed (e.g.
    ///   `https://feeds.bbci.co.uk/news/rss.xml`).
    /// * `label`: short name displayed next to items from this feed.  When
    ///   empty, the channel's own `<title>` is used.
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse an already-fetched [`rss::Channel`] into [`Item`]s.
    ///
    /// This is a pure function (no I/O) so that tests can exercise the
    /// parsing logic without hitting the network.
    pub fn parse_channel(channel: &rss::Channel, label: &str) -> Vec<Item> {
        let channel_name = if label.is_empty() {
            channel.title()
        } else {
            label
        };

        channel
            .items()
            .iter()
            .map(|item| {
                // Prefer <guid>, fall back to <link>, then empty string.
                let guid = item
                    .guid()
                    .map(|g| g.value().to_string())
                    .or_else(|| item.link().map(String::from))
                    .unwrap_or_default();

                let author = item
                    .author()
                    .map(String::from)
                    .or_else(|| {
                        item.dublin_core_ext()
                            .and_then(|dc| dc.creators().first().cloned())
                    })
                    .unwrap_or_default();

                Item {
                    title: item.title().unwrap_or("(untitled)").to_string(),
                    link: item.link().unwrap_or_default().to_string(),
                    channel: channel_name.to_string(),
                    author,
                    published: item.pub_date().unwrap_or_default().to_string(),
                    guid,
                }
            })
            .collect()
    }

    fn fetch_items(&self) -> Result<Vec<Item>, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client.get(&self.url).send()?.error_for_status()?;
        let body = response.bytes()?;
        let channel = rss::Channel::read_from(body.as_ref())?;
        Ok(Self::parse_channel(&channel, &self.label))
    }
}

impl Fetcher for RssFetcher {
    fn name(&self) -> &str {
        if self.label.is_empty() {
            &self.url
        } else {
            &self.label
        }
    }

    fn fetch(&self) -> FetchResult {
        let result = self.fetch_items();
        let next = deadline_after(self.poll_interval);
        match result {
            Ok(items) => FetchResult::ok(items, next),
            Err(e) => FetchResult::failed(e, next),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
