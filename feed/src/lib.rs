//! Tickstream Feed - terminal front end for the stream manager.
//!
//! Keeps a chart (kline) stream and a price (ticker) stream alive for the
//! selected symbol and switches both when the selection changes, the same way
//! a UI would on a symbol or interval change.
//!
//! # Components
//!
//! - [`config`]: Feed configuration loaded from the environment
//! - [`commands`]: Line command parsing
//! - [`candles`]: Chart candle buffer
//! - [`service`]: Main feed service
//! - [`error`]: Feed errors

pub mod candles;
pub mod commands;
pub mod config;
pub mod error;
pub mod service;

pub use candles::CandleBuffer;
pub use commands::{Command, CommandError};
pub use config::{ConfigError, FeedConfig};
pub use error::FeedError;
pub use service::{Control, FeedReport, FeedService, Selection};
