//! Subscription engine.
//!
//! [`subscribe`] turns a polling [`Fetcher`] into a live, de-duplicated item
//! stream.  Each subscription runs one control loop on the tokio runtime:
//!
//! ```text
//!                 spawn_blocking            ┌─────────┐  mpsc(1)  ┌──────────┐
//!  ┌─────────┐  ◄──────────────── fetch ─── │  loop   │ ────────► │ consumer │
//!  │ Fetcher │                              │ pending │           └──────────┘
//!  └─────────┘  ───── FetchResult ────────► │  seen   │ ◄── close(reply) ──┘
//!                                           └─────────┘
//! ```
//!
//! The loop waits on four guarded events and services one per iteration:
//!
//! * **close**: always enabled, checked first.  Completes the stream,
//!   abandons any in-flight fetch and replies with the last failure.
//! * **fetch done**: enabled while a fetch is outstanding.
//! * **deliver**: enabled while items are pending (or the hand-off slot is
//!   full, so the loop wakes when the consumer drains it).
//! * **start fetch**: enabled when nothing is outstanding, fewer than
//!   [`MAX_PENDING`] items are buffered and the next-attempt instant has
//!   passed.
//!
//! The fetch guard is the only backpressure: a consumer that stops reading
//! stops the fetching too.

use std::collections::{HashSet, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::error::{FetchError, Result, SubscriptionError};
use crate::source::{deadline_after, FetchResult, Fetcher, Item};

/// Most items a subscription buffers before it stops scheduling fetches.
pub const MAX_PENDING: usize = 10;

/// Delay before the next attempt after a failed fetch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Reply slot handed to a loop by [`Subscription::close`].
pub(crate) type CloseRequest = oneshot::Sender<Result<()>>;

/// Tunables for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Fixed delay before retrying after a failed fetch.
    pub retry_delay: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// A live stream of [`Item`]s that can be closed.
///
/// Created by [`subscribe`] or [`merge`](crate::merge), already running.
/// Read items with [`next`](Subscription::next) or through the
/// [`Stream`] impl; stop everything with [`close`](Subscription::close).
///
/// Dropping a subscription without closing it also stops its loop, but
/// nobody learns about the last failure.
#[derive(Debug)]
pub struct Subscription {
    updates: mpsc::Receiver<Item>,
    closing: Option<mpsc::Sender<CloseRequest>>,
}

impl Subscription {
    pub(crate) fn from_parts(
        updates: mpsc::Receiver<Item>,
        closing: mpsc::Sender<CloseRequest>,
    ) -> Self {
        Self {
            updates,
            closing: Some(closing),
        }
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the stream has finished, i.e. after
    /// [`close`](Subscription::close).  Cancel-safe.
    pub async fn next(&mut self) -> Option<Item> {
        self.updates.recv().await
    }

    /// Whether [`close`](Subscription::close) has already been called.
    pub fn is_closed(&self) -> bool {
        self.closing.is_none()
    }

    /// Stop the subscription and report the last fetch failure, if any.
    ///
    /// Does not return until the loop (and, for a merged subscription, every
    /// child) has fully stopped.  An in-flight fetch is abandoned, not
    /// awaited.  Items not yet delivered are discarded, so the stream yields
    /// `None` afterwards.
    ///
    /// A second call returns [`SubscriptionError::AlreadyClosed`].
    pub async fn close(&mut self) -> Result<()> {
        let closing = self.closing.take().ok_or(SubscriptionError::AlreadyClosed)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let outcome = match closing.send(reply_tx).await {
            Ok(()) => reply_rx.await.unwrap_or(Err(SubscriptionError::Terminated)),
            Err(_) => Err(SubscriptionError::Terminated),
        };

        self.updates.close();
        let mut discarded = 0usize;
        while self.updates.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "Discarded undelivered items on close");
        }

        outcome
    }
}

impl Stream for Subscription {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Item>> {
        self.updates.poll_recv(cx)
    }
}

/// Start a subscription with the default [`SubscriptionConfig`].
///
/// Must be called from within a tokio runtime.
pub fn subscribe(fetcher: impl Fetcher) -> Subscription {
    subscribe_with(fetcher, SubscriptionConfig::default())
}

/// Start a subscription that polls `fetcher` until closed.
///
/// The first fetch is scheduled immediately.  Must be called from within a
/// tokio runtime.
pub fn subscribe_with(fetcher: impl Fetcher, config: SubscriptionConfig) -> Subscription {
    let (updates_tx, updates_rx) = mpsc::channel(1);
    let (closing_tx, closing_rx) = mpsc::channel(1);

    let fetch_loop = FetchLoop {
        fetcher: Arc::new(fetcher),
        config,
        updates: updates_tx,
        closing: closing_rx,
    };
    tokio::spawn(fetch_loop.run());

    Subscription::from_parts(updates_rx, closing_tx)
}

struct FetchLoop<F> {
    fetcher: Arc<F>,
    config: SubscriptionConfig,
    updates: mpsc::Sender<Item>,
    closing: mpsc::Receiver<CloseRequest>,
}

impl<F: Fetcher> FetchLoop<F> {
    async fn run(self) {
        let FetchLoop {
            fetcher,
            config,
            updates,
            mut closing,
        } = self;

        let mut pending: VecDeque<Item> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut next = Instant::now();
        let mut last_error: Option<FetchError> = None;
        let mut in_flight: Option<JoinHandle<FetchResult>> = None;

        tracing::debug!(source = %fetcher.name(), "Subscription started");

        let request = loop {
            // An item parked in the hand-off slot has not been delivered yet.
            let in_slot = updates.max_capacity() - updates.capacity();
            let buffered = pending.len() + in_slot;
            let can_fetch = in_flight.is_none() && buffered < MAX_PENDING;

            tokio::select! {
                biased;

                request = closing.recv() => break request,

                joined = wait_for(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    let result = joined.unwrap_or_else(|e| {
                        FetchResult::failed(FetchError::Panicked(e.to_string()), Instant::now())
                    });

                    last_error = result.error;
                    next = result.next;
                    if let Some(e) = &last_error {
                        next = deadline_after(config.retry_delay);
                        tracing::warn!(
                            source = %fetcher.name(),
                            error = %e,
                            retry_in = ?config.retry_delay,
                            "Fetch failed"
                        );
                        continue;
                    }

                    let fetched = result.items.len();
                    for item in result.items {
                        if seen.insert(item.guid.clone()) {
                            pending.push_back(item);
                        }
                    }
                    tracing::debug!(
                        source = %fetcher.name(),
                        fetched,
                        pending = pending.len(),
                        "Fetch completed"
                    );
                }

                permit = updates.reserve(), if !pending.is_empty() || in_slot > 0 => {
                    match permit {
                        Ok(permit) => {
                            if let Some(item) = pending.pop_front() {
                                permit.send(item);
                            }
                        }
                        // The receiving half only closes once the caller is done.
                        Err(_) => break None,
                    }
                }

                _ = time::sleep_until(next), if can_fetch => {
                    tracing::debug!(source = %fetcher.name(), "Starting fetch");
                    let fetcher = Arc::clone(&fetcher);
                    in_flight = Some(tokio::task::spawn_blocking(move || fetcher.fetch()));
                }
            }
        };

        // Tear everything down before answering so that `close()` returning
        // means the loop is gone.
        drop(updates);
        drop(in_flight);
        let name = fetcher.name().to_string();
        drop(fetcher);

        let outcome = last_error.map_or(Ok(()), |e| Err(SubscriptionError::Fetch(e)));
        match request {
            Some(reply) => {
                tracing::debug!(source = %name, ok = outcome.is_ok(), "Subscription closed");
                let _ = reply.send(outcome);
            }
            None => tracing::debug!(source = %name, "Subscription dropped without close"),
        }
    }
}

/// Resolves with the outstanding fetch, or never when there is none.
async fn wait_for(
    in_flight: &mut Option<JoinHandle<FetchResult>>,
) -> std::result::Result<FetchResult, tokio::task::JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
