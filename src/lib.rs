//! Tickstream - resilient market-data streams.
//!
//! Facade over [`tickstream_sdk`]. Keeps one live feed per role (chart and
//! price), reconnects dropped feeds with bounded exponential backoff and
//! guarantees that after a subscription change no message of the previous
//! subscription reaches the role's observer.
//!
//! # Example
//!
//! ```rust,ignore
//! use tickstream::ws::StreamManager;
//! use tickstream::{Role, StreamEvent, SubscriptionKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = StreamManager::with_defaults()?;
//!
//!     manager.on_message(Role::Price, |message| {
//!         if let StreamEvent::Ticker(ticker) = message.event {
//!             println!("{} {}", ticker.symbol, ticker.last_price);
//!         }
//!     });
//!     manager.subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub use tickstream_sdk::*;
