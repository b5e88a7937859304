//! Stream message decoding.
//!
//! Decodes the exchange JSON envelopes into [`StreamEvent`] values. Kline
//! messages carry a `k` object; ticker messages carry the last price in `c`.

use serde::Deserialize;

use super::error::WsError;
use crate::error::SdkError;
use crate::types::market::{parse_decimal, parse_optional_decimal, timestamp_from_millis};
use crate::types::{Channel, Kline, StreamEvent, SubscriptionKey, Ticker};

/// A decoded message tagged with the subscription it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Subscription that produced the message.
    pub key: SubscriptionKey,

    /// Decoded payload.
    pub event: StreamEvent,
}

#[derive(Debug, Deserialize)]
struct KlineEnvelope {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    k: KlineWire,
}

#[derive(Debug, Deserialize)]
struct KlineWire {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "T")]
    close_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "i")]
    interval: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x", default)]
    is_closed: bool,
}

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "c")]
    last_price: String,
    #[serde(rename = "o")]
    open: Option<String>,
    #[serde(rename = "h")]
    high: Option<String>,
    #[serde(rename = "l")]
    low: Option<String>,
    #[serde(rename = "v")]
    volume: Option<String>,
    #[serde(rename = "P")]
    price_change_percent: Option<String>,
}

impl KlineEnvelope {
    fn into_kline(self) -> Result<Kline, SdkError> {
        let wire = self.k;
        Ok(Kline {
            symbol: wire.symbol,
            interval: wire.interval,
            open_time: timestamp_from_millis(wire.open_time)?,
            close_time: timestamp_from_millis(wire.close_time)?,
            open: parse_decimal(&wire.open)?,
            high: parse_decimal(&wire.high)?,
            low: parse_decimal(&wire.low)?,
            close: parse_decimal(&wire.close)?,
            volume: parse_decimal(&wire.volume)?,
            is_closed: wire.is_closed,
            event_time: self.event_time.map(timestamp_from_millis).transpose()?,
        })
    }
}

impl TickerEnvelope {
    fn into_ticker(self, fallback_symbol: &str) -> Result<Ticker, SdkError> {
        Ok(Ticker {
            symbol: self
                .symbol
                .unwrap_or_else(|| fallback_symbol.to_ascii_uppercase()),
            last_price: parse_decimal(&self.last_price)?,
            open: parse_optional_decimal(self.open.as_deref())?,
            high: parse_optional_decimal(self.high.as_deref())?,
            low: parse_optional_decimal(self.low.as_deref())?,
            volume: parse_optional_decimal(self.volume.as_deref())?,
            price_change_percent: parse_optional_decimal(self.price_change_percent.as_deref())?,
            event_time: self.event_time.map(timestamp_from_millis).transpose()?,
        })
    }
}

/// Decodes a text frame received on `key`'s stream.
///
/// # Errors
///
/// Returns [`WsError::Deserialization`] if the payload is not a valid
/// envelope for the key's channel.
pub fn decode(key: &SubscriptionKey, text: &str) -> Result<StreamEvent, WsError> {
    let event = match key.channel() {
        Channel::Kline => {
            let envelope: KlineEnvelope = serde_json::from_str(text)
                .map_err(|e| WsError::Deserialization(e.to_string()))?;
            envelope.into_kline().map(StreamEvent::Kline)
        }
        Channel::Ticker => {
            let envelope: TickerEnvelope = serde_json::from_str(text)
                .map_err(|e| WsError::Deserialization(e.to_string()))?;
            envelope.into_ticker(key.symbol()).map(StreamEvent::Ticker)
        }
    };
    event.map_err(|e| WsError::Deserialization(e.to_string()))
}
