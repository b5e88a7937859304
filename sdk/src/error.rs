//! SDK error types.
//!
//! Provides error types for subscription keys and market data values.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Symbol is empty or contains characters outside `[A-Za-z0-9]`.
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// Interval is not one of the supported kline intervals.
    #[error("invalid interval: {0:?}")]
    InvalidInterval(String),

    /// Kline subscription without an interval.
    #[error("kline subscription requires an interval")]
    MissingInterval,

    /// Ticker subscription carrying an interval.
    #[error("ticker subscription does not take an interval")]
    UnexpectedInterval,

    /// Numeric string could not be parsed as a decimal.
    #[error("invalid decimal: {0:?}")]
    InvalidDecimal(String),

    /// Millisecond timestamp is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
