//! Integration tests for merged subscriptions: interleaving, per-source
//! de-duplication, backpressure and the close barrier.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{assert_quiet, guids, items, take, wait_until, ScriptedFetcher, Step};
use tokio::time::timeout;
use feedmux::{merge, subscribe, FetchError, Item, SubscriptionError};
use pretty_assertions::assert_eq;

const IDLE: Duration = Duration::from_secs(3600);

/// Five single-item steps, one every `every`.
fn trickle(prefix: &str, every: Duration) -> Vec<Step> {
    (0..5)
        .map(|i| Step::Items(items(&[format!("{prefix}{i}").as_str()]), every))
        .collect()
}

fn from_source<'a>(received: &'a [Item], prefix: &str) -> Vec<&'a str> {
    received
        .iter()
        .map(|i| i.guid.as_str())
        .filter(|g| g.starts_with(prefix))
        .collect()
}

// ============================================================================
// Interleaving
// ============================================================================

#[tokio::test]
async fn test_merge_interleaves_two_sources() {
    let (fast, _) = ScriptedFetcher::new("fast", trickle("a", Duration::from_millis(10)));
    let (slow, _) = ScriptedFetcher::new("slow", trickle("b", Duration::from_millis(35)));
    let mut merged = merge([subscribe(fast), subscribe(slow)]);

    let received = take(&mut merged, 10).await;

    let unique: HashSet<&str> = guids(&received).into_iter().collect();
    assert_eq!(unique.len(), 10, "every item exactly once");
    assert_eq!(from_source(&received, "a"), vec!["a0", "a1", "a2", "a3", "a4"]);
    assert_eq!(from_source(&received, "b"), vec!["b0", "b1", "b2", "b3", "b4"]);

    assert_quiet(&mut merged, Duration::from_millis(100)).await;
    assert_eq!(merged.close().await, Ok(()));
}

#[tokio::test]
async fn test_dedup_is_per_source() {
    let (left, _) = ScriptedFetcher::new("left", vec![Step::Items(items(&["same"]), IDLE)]);
    let (right, _) = ScriptedFetcher::new("right", vec![Step::Items(items(&["same"]), IDLE)]);
    let mut merged = merge(vec![subscribe(left), subscribe(right)]);

    let received = take(&mut merged, 2).await;
    assert_eq!(guids(&received), vec!["same", "same"]);

    merged.close().await.unwrap();
}

#[tokio::test]
async fn test_nested_merge_delivers_and_closes() {
    let (a, tracker_a) = ScriptedFetcher::new("a", vec![Step::Items(items(&["a0"]), IDLE)]);
    let (b, tracker_b) = ScriptedFetcher::new("b", vec![Step::Items(items(&["b0"]), IDLE)]);
    let inner = merge([subscribe(a)]);
    let mut outer = merge([inner, subscribe(b)]);

    let received = take(&mut outer, 2).await;
    let mut got = guids(&received);
    got.sort();
    assert_eq!(got, vec!["a0", "b0"]);

    assert_eq!(outer.close().await, Ok(()));
    assert!(tracker_a.dropped());
    assert!(tracker_b.dropped());
}

// ============================================================================
// Backpressure
// ============================================================================

#[tokio::test]
async fn test_unread_merge_stops_fetching() {
    let (fetcher, tracker) = ScriptedFetcher::endless("src", 5);
    let mut merged = merge([subscribe(fetcher)]);

    // Relay and child buffers fill up, then every loop waits on the reader.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = tracker.calls();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(tracker.calls(), settled, "fetching should stop while nobody reads");
    assert!(settled <= 6, "buffers should be bounded, saw {settled} fetches");

    // Reading lets the pipeline move again.
    take(&mut merged, 25).await;
    wait_until(|| tracker.calls() > settled).await;

    merged.close().await.unwrap();
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test]
async fn test_close_is_a_barrier_over_children() {
    let (a, tracker_a) = ScriptedFetcher::new("a", vec![Step::Items(items(&["a0", "a1"]), IDLE)]);
    let (b, tracker_b) = ScriptedFetcher::new("b", vec![Step::Items(items(&["b0", "b1"]), IDLE)]);
    let (c, tracker_c) = ScriptedFetcher::new("c", Vec::new());
    let mut merged = merge([subscribe(a), subscribe(b), subscribe(c)]);

    take(&mut merged, 1).await;
    wait_until(|| tracker_a.calls() == 1 && tracker_b.calls() == 1 && tracker_c.calls() == 1).await;
    // Let the idle child finish its only fetch so nothing is in flight.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(merged.close().await, Ok(()));

    // Every child loop has stopped; with nothing in flight that also
    // releases every fetcher.
    assert!(tracker_a.dropped());
    assert!(tracker_b.dropped());
    assert!(tracker_c.dropped());
    assert_eq!(merged.next().await, None);
    assert_eq!(merged.close().await, Err(SubscriptionError::AlreadyClosed));
}

#[tokio::test]
async fn test_close_does_not_wait_for_a_stalled_child_fetch() {
    let (idle, tracker_idle) = ScriptedFetcher::new("idle", Vec::new());
    let (stalled, tracker_stalled, gate) = ScriptedFetcher::gated("stalled");
    let mut merged = merge([subscribe(idle), subscribe(stalled)]);

    wait_until(|| tracker_idle.calls() == 1 && tracker_stalled.calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = timeout(Duration::from_secs(1), merged.close())
        .await
        .expect("merged close blocked on an in-flight child fetch");
    assert_eq!(outcome, Ok(()));
    assert!(tracker_idle.dropped());
    assert_eq!(merged.next().await, None);

    // The stalled fetcher goes away once its abandoned call returns.
    drop(gate);
    wait_until(|| tracker_stalled.dropped()).await;
    assert_eq!(tracker_stalled.calls(), 1);
}

#[tokio::test]
async fn test_close_reports_single_child_failure() {
    let (ok, _) = ScriptedFetcher::new("ok", vec![Step::Items(items(&["x"]), IDLE)]);
    let (bad, tracker_bad) = ScriptedFetcher::new("bad", vec![Step::Fail("down".to_string())]);
    let mut merged = merge([subscribe(ok), subscribe(bad)]);

    take(&mut merged, 1).await;
    wait_until(|| tracker_bad.calls() >= 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        merged.close().await,
        Err(SubscriptionError::Fetch(FetchError::Other("down".to_string())))
    );
}

#[tokio::test]
async fn test_close_aggregates_failures_in_child_order() {
    let (first, p1) = ScriptedFetcher::new("first", vec![Step::Fail("one".to_string())]);
    let (second, p2) = ScriptedFetcher::new("second", vec![Step::Fail("two".to_string())]);
    let mut merged = merge([subscribe(first), subscribe(second)]);

    wait_until(|| p1.calls() >= 1 && p2.calls() >= 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        merged.close().await,
        Err(SubscriptionError::Multiple(vec![
            SubscriptionError::Fetch(FetchError::Other("one".to_string())),
            SubscriptionError::Fetch(FetchError::Other("two".to_string())),
        ]))
    );
}

#[tokio::test]
async fn test_zero_child_merge_is_finished_and_closes_cleanly() {
    let mut merged = merge(Vec::new());
    assert_eq!(merged.next().await, None);
    assert_eq!(merged.close().await, Ok(()));
}

#[tokio::test]
async fn test_dropping_merge_tears_down_children() {
    let (a, tracker_a) = ScriptedFetcher::new("a", Vec::new());
    let merged = merge([subscribe(a)]);

    wait_until(|| tracker_a.calls() >= 1).await;
    drop(merged);

    wait_until(|| tracker_a.dropped()).await;
}
