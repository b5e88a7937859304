//! Tickstream SDK - resilient market-data streams.
//!
//! This crate keeps live kline and ticker feeds alive over unreliable
//! networks. Each feed is a [`ws::StreamManager`] connection that reconnects
//! with bounded exponential backoff and delivers decoded messages to a single
//! observer per [`Role`].
//!
//! # Core Types
//!
//! - [`SubscriptionKey`]: Symbol, channel and interval of one feed
//! - [`Role`]: Consumer slot (chart or price)
//! - [`Kline`], [`Ticker`]: Decoded market data
//! - [`StreamEvent`]: Payload delivered to observers
//!
//! # Modules
//!
//! - [`ws`]: Stream manager, connections, backoff, transport
//! - [`client`]: REST bootstrap of klines and tickers
//!
//! # Example
//!
//! ```rust
//! use tickstream_sdk::{Role, SubscriptionKey};
//! use tickstream_sdk::ws::BackoffPolicy;
//!
//! let key = SubscriptionKey::kline("BTCUSDT", "1m");
//! assert_eq!(
//!     key.endpoint("wss://stream.binance.com:9443/ws").ok().as_deref(),
//!     Some("wss://stream.binance.com:9443/ws/btcusdt@kline_1m")
//! );
//! assert_eq!(Role::Chart.as_str(), "chart");
//! assert_eq!(BackoffPolicy::default().delay_ms(3), 8_000);
//! ```

pub mod client;
pub mod error;
pub mod types;
pub mod ws;

pub use error::SdkError;
pub use types::{Channel, Kline, Role, StreamEvent, SubscriptionKey, Ticker};
