//! Feed configuration.
//!
//! Provides configuration options for the feed, loaded from the environment.

use std::env;

use serde::{Deserialize, Serialize};
use tickstream_sdk::client::config::DEFAULT_BASE_URL;
use tickstream_sdk::client::ClientConfig;
use tickstream_sdk::ws::config::DEFAULT_STREAM_URL;
use tickstream_sdk::ws::StreamConfig;
use tickstream_sdk::{SdkError, SubscriptionKey};

/// Environment variable holding the initial symbol.
pub const ENV_SYMBOL: &str = "TICKSTREAM_SYMBOL";

/// Environment variable holding the initial chart interval.
pub const ENV_INTERVAL: &str = "TICKSTREAM_INTERVAL";

/// Environment variable holding the stream base URL.
pub const ENV_STREAM_URL: &str = "TICKSTREAM_STREAM_URL";

/// Environment variable holding the REST base URL.
pub const ENV_REST_URL: &str = "TICKSTREAM_REST_URL";

/// Environment variable holding the number of candles to bootstrap.
pub const ENV_HISTORY_LIMIT: &str = "TICKSTREAM_HISTORY_LIMIT";

/// Largest history the REST API serves in one request.
pub const MAX_HISTORY_LIMIT: u16 = 1_000;

/// Configuration for the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Initial trading pair symbol.
    pub symbol: String,

    /// Initial chart interval.
    pub interval: String,

    /// Stream base URL.
    pub stream_url: String,

    /// REST base URL.
    pub rest_url: String,

    /// Candles loaded over REST before streaming. Zero disables the REST
    /// bootstrap.
    pub history_limit: u16,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            rest_url: DEFAULT_BASE_URL.to_string(),
            history_limit: 500,
        }
    }
}

impl FeedConfig {
    /// Loads the configuration from the environment, falling back to the
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(symbol) = lookup(ENV_SYMBOL) {
            config.symbol = symbol.trim().to_ascii_uppercase();
        }
        if let Some(interval) = lookup(ENV_INTERVAL) {
            config.interval = interval.trim().to_string();
        }
        if let Some(url) = lookup(ENV_STREAM_URL) {
            config.stream_url = url;
        }
        if let Some(url) = lookup(ENV_REST_URL) {
            config.rest_url = url;
        }
        if let Some(limit) = lookup(ENV_HISTORY_LIMIT) {
            config.history_limit = limit
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHistoryLimit(limit.clone()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the initial symbol.
    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Sets the initial chart interval.
    #[must_use]
    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Sets the stream base URL.
    #[must_use]
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    /// Sets the number of candles to bootstrap.
    #[must_use]
    pub fn with_history_limit(mut self, limit: u16) -> Self {
        self.history_limit = limit;
        self
    }

    /// Returns the chart key for the initial selection.
    #[must_use]
    pub fn chart_key(&self) -> SubscriptionKey {
        SubscriptionKey::kline(self.symbol.clone(), self.interval.clone())
    }

    /// Returns the stream manager configuration.
    #[must_use]
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new(self.stream_url.clone())
    }

    /// Returns the REST client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.rest_url.clone())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chart_key().validate()?;

        if self.history_limit > MAX_HISTORY_LIMIT {
            return Err(ConfigError::InvalidHistoryLimit(
                self.history_limit.to_string(),
            ));
        }

        self.stream_config()
            .validate()
            .map_err(|e| ConfigError::InvalidStream(e.to_string()))?;

        if self.history_limit > 0 {
            self.client_config()
                .validate()
                .map_err(|e| ConfigError::InvalidRest(e.to_string()))?;
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid symbol or interval.
    #[error("invalid selection: {0}")]
    InvalidSelection(#[from] SdkError),

    /// Invalid history limit.
    #[error("history limit must be a number in 0..=1000, got {0:?}")]
    InvalidHistoryLimit(String),

    /// Invalid stream settings.
    #[error("invalid stream settings: {0}")]
    InvalidStream(String),

    /// Invalid REST settings.
    #[error("invalid REST settings: {0}")]
    InvalidRest(String),
}
