//! HTTP client for the market-data REST API.
//!
//! Used to seed the chart with recent candles and the price display with the
//! current ticker before the live streams deliver their first message.
//!
//! # Example
//!
//! ```rust,ignore
//! use tickstream_sdk::client::MarketDataClient;
//! use tickstream_sdk::SubscriptionKey;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MarketDataClient::with_defaults()?;
//!
//!     let klines = client
//!         .get_klines(&SubscriptionKey::kline("BTCUSDT", "1m"), 500)
//!         .await?;
//!     println!("Loaded {} candles", klines.len());
//!
//!     let ticker = client.get_ticker("BTCUSDT").await?;
//!     println!("Last price: {}", ticker.last_price);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::MarketDataClient;
