//! WebSocket configuration.
//!
//! Provides configuration options for stream connections.

use std::time::Duration;

use super::backoff::BackoffPolicy;
use super::error::WsError;

/// Default stream base URL.
pub const DEFAULT_STREAM_URL: &str = "wss://stream.binance.com:9443/ws";

/// Default initial reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;

/// Maximum reconnect delay in milliseconds.
pub const MAX_RECONNECT_DELAY_MS: u64 = 60_000;

/// Default maximum inbound message size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 << 20;

/// Stream connection configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Base URL that stream names are appended to.
    pub base_url: String,

    /// Initial reconnect delay.
    pub reconnect_delay: Duration,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Maximum inbound message size.
    pub max_message_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STREAM_URL.to_string(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(MAX_RECONNECT_DELAY_MS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl StreamConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the initial reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum inbound message size.
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Returns the backoff policy described by this configuration.
    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.reconnect_delay, self.max_reconnect_delay)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.base_url.is_empty() {
            return Err(WsError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("ws://") && !self.base_url.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "base_url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.reconnect_delay > self.max_reconnect_delay {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be <= max_reconnect_delay".to_string(),
            ));
        }

        if self.max_message_size == 0 {
            return Err(WsError::InvalidConfig(
                "max_message_size must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.base_url, DEFAULT_STREAM_URL);
        assert_eq!(config.reconnect_delay, Duration::from_millis(1_000));
        assert_eq!(config.max_reconnect_delay, Duration::from_millis(60_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StreamConfig::new("wss://example.com/ws")
            .with_reconnect_delay(Duration::from_millis(500))
            .with_max_reconnect_delay(Duration::from_secs(10))
            .with_max_message_size(1024);

        assert_eq!(config.base_url, "wss://example.com/ws");
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.backoff().delay(0), Duration::from_millis(500));
    }

    #[test]
    fn test_config_validate_empty_url() {
        let config = StreamConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_invalid_scheme() {
        let config = StreamConfig::new("https://example.com/ws");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_inverted_delays() {
        let config = StreamConfig::default()
            .with_reconnect_delay(Duration::from_secs(10))
            .with_max_reconnect_delay(Duration::from_secs(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_delay() {
        let config = StreamConfig::default().with_reconnect_delay(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
