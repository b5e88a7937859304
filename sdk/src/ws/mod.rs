//! Live market-data streams.
//!
//! This module keeps one kline feed (chart) and one ticker feed (price) alive
//! over WebSocket connections that reconnect with bounded exponential backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use tickstream_sdk::ws::{StreamConfig, StreamManager};
//! use tickstream_sdk::{Role, SubscriptionKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = StreamManager::new(StreamConfig::default())?;
//!
//!     manager.on_message(Role::Price, |message| {
//!         println!("{}: {}", message.key, message.event.last_price());
//!     });
//!     manager.subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))?;
//!     manager.subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "1m"))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod messages;
pub mod metrics;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use config::StreamConfig;
pub use connection::{ConnectionState, ConnectionStatus, MessageHandler};
pub use error::WsError;
pub use manager::StreamManager;
pub use messages::{decode, StreamMessage};
pub use metrics::{StreamMetrics, StreamMetricsSnapshot};
pub use transport::{FrameStream, Transport, TungsteniteTransport};
