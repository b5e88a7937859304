//! Market data types.
//!
//! Decoded candlestick and ticker values delivered to stream observers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SdkError;

/// A candlestick for one interval bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kline {
    /// Trading pair symbol.
    pub symbol: String,

    /// Kline interval (e.g. `1m`).
    pub interval: String,

    /// Bucket open time.
    pub open_time: DateTime<Utc>,

    /// Bucket close time.
    pub close_time: DateTime<Utc>,

    /// Open price.
    pub open: Decimal,

    /// High price.
    pub high: Decimal,

    /// Low price.
    pub low: Decimal,

    /// Close (latest) price.
    pub close: Decimal,

    /// Base asset volume.
    pub volume: Decimal,

    /// Whether the bucket is final.
    pub is_closed: bool,

    /// Exchange event time, when the message carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
}

impl Kline {
    /// Returns the high-low range.
    #[must_use]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Returns true if the close is at or above the open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Rolling 24h ticker snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    /// Trading pair symbol.
    pub symbol: String,

    /// Last traded price.
    pub last_price: Decimal,

    /// Open price of the 24h window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    /// 24h high.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    /// 24h low.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    /// 24h base asset volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// 24h price change percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_change_percent: Option<Decimal>,

    /// Exchange event time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
}

/// A decoded stream payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Candlestick update.
    Kline(Kline),
    /// Ticker update.
    Ticker(Ticker),
}

impl StreamEvent {
    /// Returns the symbol the event refers to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Kline(kline) => &kline.symbol,
            Self::Ticker(ticker) => &ticker.symbol,
        }
    }

    /// Returns the latest price carried by the event.
    #[must_use]
    pub fn last_price(&self) -> Decimal {
        match self {
            Self::Kline(kline) => kline.close,
            Self::Ticker(ticker) => ticker.last_price,
        }
    }
}

/// Parses an exchange numeric string.
pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, SdkError> {
    Decimal::from_str(value).map_err(|_| SdkError::InvalidDecimal(value.to_string()))
}

/// Parses an optional exchange numeric string.
pub(crate) fn parse_optional_decimal(value: Option<&str>) -> Result<Option<Decimal>, SdkError> {
    value.map(parse_decimal).transpose()
}

/// Converts exchange milliseconds into a UTC timestamp.
pub(crate) fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, SdkError> {
    DateTime::from_timestamp_millis(millis).ok_or(SdkError::InvalidTimestamp(millis))
}
