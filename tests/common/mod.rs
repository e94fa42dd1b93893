//! Shared helpers: a scripted in-memory fetcher and item builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use feedmux::{FetchError, FetchResult, Fetcher, Item, Subscription};
use tokio::time::Instant;

/// Upper bound for any single await in a test.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// Delay returned once a script runs out, long enough to never fire.
const IDLE: Duration = Duration::from_secs(3600);

pub fn item(guid: &str) -> Item {
    Item {
        title: format!("Title {guid}"),
        link: format!("https://example.com/{guid}"),
        channel: "test".to_string(),
        author: String::new(),
        published: String::new(),
        guid: guid.to_string(),
    }
}

pub fn items(guids: &[&str]) -> Vec<Item> {
    guids.iter().map(|g| item(g)).collect()
}

/// One scripted fetch attempt.
pub enum Step {
    /// Return these items; allow the next attempt after the delay.
    Items(Vec<Item>, Duration),
    /// Fail with this message.
    Fail(String),
}

/// Observable side effects of a [`ScriptedFetcher`].
#[derive(Clone, Default)]
pub struct Tracker {
    calls: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Tracker {
    /// Number of `fetch()` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the fetcher has been dropped, i.e. its subscription is gone.
    pub fn dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Plays back a fixed list of steps, then idles.
pub struct ScriptedFetcher {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    /// When set, every call produces fresh items instead of following `steps`.
    endless_batch: Option<usize>,
    /// When set, every call blocks until the sender side is dropped or fed.
    gate: Option<Mutex<mpsc::Receiver<()>>>,
    tracker: Tracker,
}

impl ScriptedFetcher {
    pub fn new(name: &str, steps: Vec<Step>) -> (Self, Tracker) {
        let tracker = Tracker::default();
        let fetcher = Self {
            name: name.to_string(),
            steps: Mutex::new(steps.into()),
            endless_batch: None,
            gate: None,
            tracker: tracker.clone(),
        };
        (fetcher, tracker)
    }

    /// A fetcher that returns `batch` never-seen items on every call and
    /// allows the next attempt immediately.
    pub fn endless(name: &str, batch: usize) -> (Self, Tracker) {
        let (mut fetcher, tracker) = Self::new(name, Vec::new());
        fetcher.endless_batch = Some(batch);
        (fetcher, tracker)
    }

    /// A fetcher whose calls block until the returned sender sends or drops.
    pub fn gated(name: &str) -> (Self, Tracker, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let (mut fetcher, tracker) = Self::new(name, Vec::new());
        fetcher.gate = Some(Mutex::new(rx));
        (fetcher, tracker, tx)
    }
}

impl Fetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> FetchResult {
        let call = self.tracker.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }

        if let Some(batch) = self.endless_batch {
            let fresh = (0..batch)
                .map(|i| item(&format!("{}-{call}-{i}", self.name)))
                .collect();
            return FetchResult::ok(fresh, Instant::now());
        }

        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Items(items, delay)) => FetchResult::ok(items, Instant::now() + delay),
            Some(Step::Fail(message)) => {
                FetchResult::failed(FetchError::Other(message), Instant::now())
            }
            None => FetchResult::ok(Vec::new(), Instant::now() + IDLE),
        }
    }
}

impl Drop for ScriptedFetcher {
    fn drop(&mut self) {
        self.tracker.dropped.store(true, Ordering::SeqCst);
    }
}

/// Read exactly `n` items, failing the test if they don't arrive in time.
pub async fn take(sub: &mut Subscription, n: usize) -> Vec<Item> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let next = tokio::time::timeout(PATIENCE, sub.next())
            .await
            .expect("timed out waiting for an item")
            .expect("stream ended early");
        out.push(next);
    }
    out
}

/// Assert nothing arrives within `window`.
pub async fn assert_quiet(sub: &mut Subscription, window: Duration) {
    if let Ok(Some(item)) = tokio::time::timeout(window, sub.next()).await {
        panic!("unexpected item {:?}", item.guid);
    }
}

pub fn guids(items: &[Item]) -> Vec<&str> {
    items.iter().map(|i| i.guid.as_str()).collect()
}

/// Poll `cond` until it holds, failing the test after [`PATIENCE`].
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + PATIENCE;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
