//! N-way merge of subscriptions.
//!
//! [`merge`] folds any number of [`Subscription`]s into one.  Every child gets
//! a relay task that moves its items into a shared output channel; a
//! coordinator task owns the relays and answers the merged `close()`.
//!
//! ```text
//!  child 0 ──► relay 0 (pending) ──┐
//!  child 1 ──► relay 1 (pending) ──┼──► mpsc(1) ──► merged consumer
//!  child n ──► relay n (pending) ──┘
//!                 ▲ stop
//!            coordinator ◄── close(reply)
//! ```
//!
//! Items from one child keep their order; across children the order is
//! whatever the runtime picks.  De-duplication stays per child: two feeds
//! publishing the same GUID both get through.

use std::collections::VecDeque;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, SubscriptionError};
use crate::source::Item;
use crate::subscription::{CloseRequest, Subscription, MAX_PENDING};

/// A relay task plus the private signal that stops it.
struct Relay {
    index: usize,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Subscription>,
}

/// Merge `subs` into a single subscription.
///
/// Zero children is fine: the merged stream ends immediately and `close()`
/// succeeds.  Closing the merged subscription stops every relay, closes every
/// child and only then returns, reporting child failures per
/// [`SubscriptionError::aggregate`].
///
/// Must be called from within a tokio runtime.
pub fn merge(subs: impl IntoIterator<Item = Subscription>) -> Subscription {
    let (out_tx, out_rx) = mpsc::channel(1);
    let (closing_tx, closing_rx) = mpsc::channel(1);

    let relays: Vec<Relay> = subs
        .into_iter()
        .enumerate()
        .map(|(index, child)| {
            let (stop_tx, stop_rx) = oneshot::channel();
            let handle = tokio::spawn(relay(child, out_tx.clone(), stop_rx));
            Relay {
                index,
                stop: stop_tx,
                handle,
            }
        })
        .collect();
    // Only relays hold senders now, so the stream ends once they all stop.
    drop(out_tx);

    tracing::debug!(children = relays.len(), "Merged subscription started");
    tokio::spawn(coordinate(relays, closing_rx));

    Subscription::from_parts(out_rx, closing_tx)
}

/// Moves items from `child` to `out` until told to stop, then hands the
/// child back so it can be closed.
async fn relay(
    mut child: Subscription,
    out: mpsc::Sender<Item>,
    mut stop: oneshot::Receiver<()>,
) -> Subscription {
    let mut pending: VecDeque<Item> = VecDeque::new();
    let mut child_open = true;

    loop {
        tokio::select! {
            biased;

            // Fires on an explicit stop and when the coordinator is gone.
            _ = &mut stop => break,

            permit = out.reserve(), if !pending.is_empty() => match permit {
                Ok(permit) => {
                    if let Some(item) = pending.pop_front() {
                        permit.send(item);
                    }
                }
                Err(_) => break,
            },

            item = child.next(), if child_open && pending.len() < MAX_PENDING => match item {
                Some(item) => pending.push_back(item),
                None => child_open = false,
            },
        }
    }

    child
}

async fn coordinate(relays: Vec<Relay>, mut closing: mpsc::Receiver<CloseRequest>) {
    // `None` means the merged handle was dropped; tear down all the same.
    let request = closing.recv().await;

    let outcomes = join_all(relays.into_iter().map(shutdown_relay)).await;
    let failures: Vec<SubscriptionError> = outcomes
        .into_iter()
        .filter_map(|outcome| outcome.err())
        .collect();
    let outcome = SubscriptionError::aggregate(failures);

    match request {
        Some(reply) => {
            tracing::debug!(ok = outcome.is_ok(), "Merged subscription closed");
            let _ = reply.send(outcome);
        }
        None => {
            if let Err(e) = outcome {
                tracing::warn!(error = %e, "Merged subscription dropped with failures");
            }
        }
    }
}

async fn shutdown_relay(relay: Relay) -> Result<()> {
    let Relay {
        index,
        stop,
        handle,
    } = relay;

    // The relay may already have exited on its own; that is fine.
    let _ = stop.send(());
    let mut child = match handle.await {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(child = index, error = %e, "Relay task failed");
            return Err(SubscriptionError::Terminated);
        }
    };

    let outcome = child.close().await;
    if let Err(e) = &outcome {
        tracing::warn!(child = index, error = %e, "Child subscription reported a failure");
    }
    outcome
}
