//! WebSocket error types.
//!
//! Provides error types for stream connections.

use std::fmt;

use crate::error::SdkError;

/// WebSocket errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    /// Connection failed.
    Connection(String),

    /// WebSocket protocol error.
    Protocol(String),

    /// Failed to deserialize message.
    Deserialization(String),

    /// Subscription key is invalid.
    InvalidSubscription(SdkError),

    /// Invalid configuration.
    InvalidConfig(String),
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Deserialization(msg) => write!(f, "deserialization failed: {}", msg),
            Self::InvalidSubscription(err) => write!(f, "invalid subscription: {}", err),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for WsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidSubscription(err) => Some(err),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<SdkError> for WsError {
    fn from(err: SdkError) -> Self {
        Self::InvalidSubscription(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_error_display() {
        let err = WsError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "connection failed: timeout");
    }

    #[test]
    fn test_ws_error_invalid_subscription() {
        let err = WsError::from(SdkError::MissingInterval);
        assert_eq!(
            err.to_string(),
            "invalid subscription: kline subscription requires an interval"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_ws_error_deserialization() {
        let err = WsError::Deserialization("expected value".to_string());
        assert_eq!(err.to_string(), "deserialization failed: expected value");
        assert!(std::error::Error::source(&err).is_none());
    }
}
