//! Client error types.
//!
//! Provides error types for REST client operations.

use std::fmt;

use crate::error::SdkError;

/// Client errors.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP request failed.
    Request(reqwest::Error),

    /// Failed to deserialize response.
    Deserialization(String),

    /// API returned an error response.
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },

    /// Rate limited (429).
    RateLimited {
        /// Retry after seconds.
        retry_after: Option<u64>,
    },

    /// Request parameters are invalid.
    InvalidRequest(SdkError),

    /// Invalid configuration.
    InvalidConfig(String),

    /// Request timeout.
    Timeout,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(e) => write!(f, "HTTP request failed: {}", e),
            Self::Deserialization(msg) => write!(f, "deserialization failed: {}", msg),
            Self::Api { code, message } => write!(f, "API error [{}]: {}", code, message),
            Self::RateLimited { retry_after } => {
                if let Some(secs) = retry_after {
                    write!(f, "rate limited, retry after {} seconds", secs)
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidRequest(err) => write!(f, "invalid request: {}", err),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Timeout => write!(f, "request timeout"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(e) => Some(e),
            Self::InvalidRequest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

impl From<SdkError> for ClientError {
    fn from(err: SdkError) -> Self {
        Self::InvalidRequest(err)
    }
}
