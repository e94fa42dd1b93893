//! feedmux: a live-updating RSS feed reader for the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────────┐        ┌─────────┐  Item   ┌──────────┐  draw()  ┌──────────┐
//! │ Subscription │ ─────► │ merge() │ ──────► │  app.rs  │ ───────► │  ui.rs   │
//! │  (per feed)  │        └─────────┘         │ (state)  │          │ (render) │
//! └──────────────┘                            └──────────┘          └──────────┘
//!                                                  ▲
//!                                                  │ handle_key_event()
//!                                             ┌──────────┐
//!                                             │ input.rs │
//!                                             └──────────┘
//! ```
//!
//! * **`feedmux`** (the library): fetchers, subscriptions and merging.
//! * **`app`**: owns all application state (items, scroll position, etc.).
//! * **`ui`**: pure rendering: reads `App` state and draws widgets.
//! * **`input`**: maps key events to `App` mutations.
//! * **`main`**: wires everything together: parse args, subscribe, set up
//!   the terminal, and run the event loop.

mod app;
mod input;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use app::App;
use feedmux::{merge, subscribe_with, Config, FeedConfig, RssFetcher, Subscription};

const DEFAULT_FEED: &str = "https://feeds.bbci.co.uk/news/rss.xml";

/// UI refresh rate (~10 fps).
const TICK_RATE: Duration = Duration::from_millis(100);

/// How long exit waits for fetches still running after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "feedmux", about = "Live-scrolling merged RSS feeds in the terminal")]
struct Args {
    /// Feed URLs to follow (overrides the config file's feed list)
    #[arg(value_name = "URL")]
    feeds: Vec<String>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// RAII terminal guard, restores the terminal even on panic
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen.  When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Install a panic hook that restores the terminal before printing the
/// panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// Command-line URLs win over the config file; with neither, follow a
/// default feed.
fn feeds_to_follow(args: &Args, config: &Config) -> Vec<FeedConfig> {
    if !args.feeds.is_empty() {
        return args.feeds.iter().map(|url| FeedConfig::new(url, "")).collect();
    }
    if !config.feeds.is_empty() {
        return config.feeds.clone();
    }
    vec![FeedConfig::new(DEFAULT_FEED, "BBC")]
}

fn open_subscriptions(feeds: &[FeedConfig], config: &Config) -> Subscription {
    let subs: Vec<Subscription> = feeds
        .iter()
        .map(|feed| {
            tracing::info!(url = %feed.url, label = %feed.label, "Subscribing");
            let fetcher = RssFetcher::new(&feed.url, &feed.label)
                .with_poll_interval(config.poll_interval());
            subscribe_with(fetcher, config.subscription())
        })
        .collect();
    merge(subs)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // The TUI owns stdout; logs go to stderr (redirect with `2>feedmux.log`).
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(args));
    // Closed subscriptions may leave a fetch running on the blocking pool;
    // don't hold the exit hostage to it.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(args: Args) -> Result<()> {

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let feeds = feeds_to_follow(&args, &config);
    let mut merged = open_subscriptions(&feeds, &config);

    install_panic_hook();
    let run_result = run_ui(&mut merged, feeds.len()).await;

    // Terminal is restored by now; shut every feed down before exiting.
    if let Err(e) = merged.close().await {
        tracing::warn!(error = %e, "Feeds reported errors on shutdown");
        eprintln!("feedmux: {e}");
    }

    run_result
}

/// Runs the event loop until the user quits.
///
/// Multiplexes the merged item stream, terminal input and a redraw tick.
async fn run_ui(merged: &mut Subscription, feed_count: usize) -> Result<()> {
    // -- terminal setup (Drop restores on exit or panic) --------------
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new();
    app.status = format!("Following {feed_count} feed(s)…");

    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK_RATE);
    let mut stream_open = true;

    loop {
        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        tokio::select! {
            item = merged.next(), if stream_open => match item {
                Some(item) => app.receive(item),
                None => {
                    stream_open = false;
                    app.status = "All feeds stopped".to_string();
                }
            },

            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => input::handle_key_event(&mut app, key),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => break,
            },

            _ = tick.tick() => {}
        }

        if app.quit {
            break;
        }
    }

    // `guard` is dropped here, restoring the terminal.
    Ok(())
}
