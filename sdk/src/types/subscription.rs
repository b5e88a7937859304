//! Subscription identity types.
//!
//! A [`SubscriptionKey`] names exactly one live feed; a [`Role`] names the
//! consumer slot a feed is attached to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SdkError;

/// Kline intervals accepted by the market-data host.
pub const SUPPORTED_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

/// Logical consumer of a live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Candlestick chart.
    Chart,
    /// Last-price display.
    Price,
}

impl Role {
    /// Every role, in registry order.
    pub const ALL: [Self; 2] = [Self::Chart, Self::Price];

    /// Returns the role name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Price => "price",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream channel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Candlestick updates.
    Kline,
    /// Rolling 24h ticker.
    Ticker,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kline => write!(f, "kline"),
            Self::Ticker => write!(f, "ticker"),
        }
    }
}

/// Identifies one logical live feed.
///
/// Two keys are equal iff symbol, channel and interval all match. The symbol
/// is kept exactly as given; stream names use its lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    symbol: String,
    channel: Channel,
    interval: Option<String>,
}

impl SubscriptionKey {
    /// Creates a key from its parts without validating them.
    #[must_use]
    pub fn new(symbol: impl Into<String>, channel: Channel, interval: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            channel,
            interval,
        }
    }

    /// Creates a kline key.
    #[must_use]
    pub fn kline(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self::new(symbol, Channel::Kline, Some(interval.into()))
    }

    /// Creates a ticker key.
    #[must_use]
    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Channel::Ticker, None)
    }

    /// Returns the symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the channel.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Returns the kline interval, if any.
    #[must_use]
    pub fn interval(&self) -> Option<&str> {
        self.interval.as_deref()
    }

    /// Validates the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is empty or not alphanumeric, if a kline
    /// key has no supported interval, or if a ticker key carries one.
    pub fn validate(&self) -> Result<(), SdkError> {
        if self.symbol.is_empty() || !self.symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SdkError::InvalidSymbol(self.symbol.clone()));
        }

        match (self.channel, self.interval.as_deref()) {
            (Channel::Kline, None) => Err(SdkError::MissingInterval),
            (Channel::Kline, Some(interval)) if !SUPPORTED_INTERVALS.contains(&interval) => {
                Err(SdkError::InvalidInterval(interval.to_string()))
            }
            (Channel::Ticker, Some(_)) => Err(SdkError::UnexpectedInterval),
            _ => Ok(()),
        }
    }

    /// Returns the stream name, e.g. `btcusdt@kline_1m` or `btcusdt@ticker`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn stream_name(&self) -> Result<String, SdkError> {
        self.validate()?;
        let symbol = self.symbol.to_ascii_lowercase();
        match (self.channel, self.interval.as_deref()) {
            (Channel::Kline, Some(interval)) => Ok(format!("{symbol}@kline_{interval}")),
            (Channel::Kline, None) => Err(SdkError::MissingInterval),
            (Channel::Ticker, _) => Ok(format!("{symbol}@ticker")),
        }
    }

    /// Returns the full stream endpoint below `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn endpoint(&self, base_url: &str) -> Result<String, SdkError> {
        let stream = self.stream_name()?;
        Ok(format!("{}/{stream}", base_url.trim_end_matches('/')))
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.interval {
            Some(interval) => write!(f, "{}@{}_{}", self.symbol, self.channel, interval),
            None => write!(f, "{}@{}", self.symbol, self.channel),
        }
    }
}
