//! Configuration file parser.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning so typos do
//! not go unnoticed.
//!
//! ```toml
//! poll_interval_secs = 30
//! retry_delay_secs = 10
//!
//! [[feeds]]
//! url = "https://feeds.bbci.co.uk/news/rss.xml"
//! label = "BBC"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::subscription::SubscriptionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// One feed to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Display name; empty means "use the channel title".
    #[serde(default)]
    pub label: String,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between successful polls of one feed.
    pub poll_interval_secs: u64,

    /// Seconds to wait before retrying a failed fetch.
    pub retry_delay_secs: u64,

    /// Feeds to subscribe to when none are given on the command line.
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            retry_delay_secs: 10,
            feeds: Vec::new(),
        }
    }
}

impl Config {
    const KNOWN_KEYS: [&'static str; 3] = ["poll_interval_secs", "retry_delay_secs", "feeds"];

    /// Longest accepted poll interval or retry delay.
    const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Zero intervals → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, secs) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("retry_delay_secs", self.retry_delay_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be at least 1".to_string(),
                });
            }
            if secs > Self::MAX_INTERVAL_SECS {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("must be at most {} (one week)", Self::MAX_INTERVAL_SECS),
                });
            }
        }
        if let Some(feed) = self.feeds.iter().find(|f| f.url.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                key: "feeds",
                reason: format!("feed {:?} has an empty url", feed.label),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Engine settings derived from this configuration.
    pub fn subscription(&self) -> SubscriptionConfig {
        SubscriptionConfig {
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}
