//! Feed error types.

use tickstream_sdk::client::ClientError;
use tickstream_sdk::ws::WsError;
use tickstream_sdk::SdkError;

use crate::commands::CommandError;
use crate::config::ConfigError;

/// Errors raised by the feed service.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid symbol or interval selection.
    #[error("invalid selection: {0}")]
    Selection(#[from] SdkError),

    /// Stream manager error.
    #[error("stream error: {0}")]
    Stream(#[from] WsError),

    /// REST client error.
    #[error("REST error: {0}")]
    Client(#[from] ClientError),

    /// Unparseable command.
    #[error("command error: {0}")]
    Command(#[from] CommandError),
}
