//! The item type every fetcher produces.
//!
//! `Item` represents a single entry from a feed.  Every fetcher converts its
//! native format into `Item`s so subscriptions, merging and the UI can stay
//! source-agnostic.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A single feed entry.
///
/// `guid` is the de-duplication key: a subscription never delivers two items
/// with the same `guid`.  Items are plain values and never change once a
/// fetcher has produced them.
///
/// ## Sorting
///
/// `Item` implements [`Ord`] for **reverse-chronological** ordering by
/// [`published_at`](Item::published_at): newer items sort before older ones,
/// and items without a parseable date sort last.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct Item {
    /// Human-readable headline.
    pub title: String,

    /// URL to the full content.
    pub link: String,

    /// Name of the channel / feed this came from (e.g. "BBC News").
    pub channel: String,

    /// Author as given by the feed, empty if absent.
    pub author: String,

    /// Publication timestamp exactly as the feed wrote it.
    pub published: String,

    /// Unique identifier used for de-duplication.
    ///
    /// For RSS this is the `<guid>` element (falling back to `<link>`).
    pub guid: String,
}

impl Item {
    /// Parse [`published`](Item::published) as an RFC 2822 date.
    ///
    /// Returns `None` for empty or malformed timestamps.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc2822(self.published.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// Ordering: reverse chronological (newest first)
// ---------------------------------------------------------------------------

impl Ord for Item {
    fn cmp(&self, other: &Self) -> Ordering {
        // `None` is less than `Some(_)`, so comparing `other` first puts
        // newest first and undated items at the bottom.
        other
            .published_at()
            .cmp(&self.published_at())
            .then_with(|| self.guid.cmp(&other.guid))
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
