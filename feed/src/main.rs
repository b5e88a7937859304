//! Tickstream Feed binary.
//!
//! Streams the configured symbol and reads commands from stdin.

use tickstream_feed::{Control, FeedConfig, FeedService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tickstream_feed=debug,tickstream_sdk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = FeedConfig::from_env()?;

    tracing::info!("Starting Tickstream Feed");
    tracing::info!("Stream URL: {}", config.stream_url);
    tracing::info!("REST URL: {}", config.rest_url);
    tracing::info!("Symbol: {} ({})", config.symbol, config.interval);

    let service = FeedService::new(config)?;
    service.start().await?;
    tracing::info!("Commands: symbol <SYM>, interval <I>, status, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match service.handle_line(&line).await {
                    Ok(Control::Quit) => break,
                    Ok(Control::Continue) => {}
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("Shutting down feed");
    service.shutdown().await;

    Ok(())
}
