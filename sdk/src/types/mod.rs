//! Core types for the Tickstream SDK.
//!
//! This module provides subscription identities and the decoded market data
//! values delivered by live feeds.

pub mod market;
pub mod subscription;

pub use market::{Kline, StreamEvent, Ticker};
pub use subscription::{Channel, Role, SubscriptionKey, SUPPORTED_INTERVALS};
