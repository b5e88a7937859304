//! Main feed service.
//!
//! Owns the stream manager, keeps the chart candles and the latest ticker up
//! to date and applies selection changes coming from line commands.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tickstream_sdk::client::MarketDataClient;
use tickstream_sdk::ws::{
    ConnectionStatus, StreamManager, StreamMetrics, StreamMetricsSnapshot, Transport,
};
use tickstream_sdk::{Role, StreamEvent, SubscriptionKey, Ticker};
use tracing::{debug, info, warn};

use super::candles::CandleBuffer;
use super::commands::Command;
use super::config::{FeedConfig, MAX_HISTORY_LIMIT};
use super::error::FeedError;

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep reading commands.
    Continue,
    /// Stop the feed.
    Quit,
}

/// Currently selected symbol and chart interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Trading pair symbol.
    pub symbol: String,
    /// Chart interval.
    pub interval: String,
}

impl Selection {
    /// Returns the chart key.
    #[must_use]
    pub fn chart_key(&self) -> SubscriptionKey {
        SubscriptionKey::kline(self.symbol.clone(), self.interval.clone())
    }

    /// Returns the price key.
    #[must_use]
    pub fn price_key(&self) -> SubscriptionKey {
        SubscriptionKey::ticker(self.symbol.clone())
    }
}

/// Data the observers write into.
#[derive(Debug)]
struct FeedState {
    chart_key: SubscriptionKey,
    price_key: SubscriptionKey,
    candles: CandleBuffer,
    ticker: Option<Ticker>,
}

/// Point-in-time report of the feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedReport {
    /// Current selection.
    pub selection: Selection,
    /// Connection status per subscribed role.
    pub connections: Vec<ConnectionStatus>,
    /// Stream metrics.
    pub metrics: StreamMetricsSnapshot,
    /// Latest ticker price.
    pub last_price: Option<Decimal>,
    /// Close of the newest candle.
    pub last_close: Option<Decimal>,
    /// Candles held for the chart.
    pub candles: usize,
}

/// The feed service.
pub struct FeedService {
    config: FeedConfig,
    manager: StreamManager,
    client: Option<MarketDataClient>,
    selection: Mutex<Selection>,
    state: Arc<Mutex<FeedState>>,
}

impl FeedService {
    /// Creates a feed streaming over WebSocket.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let manager = StreamManager::new(config.stream_config())?;
        Self::with_manager(config, manager)
    }

    /// Creates a feed streaming over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(
        config: FeedConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, FeedError> {
        config.validate()?;
        let manager = StreamManager::with_transport(config.stream_config(), transport)?;
        Self::with_manager(config, manager)
    }

    fn with_manager(config: FeedConfig, manager: StreamManager) -> Result<Self, FeedError> {
        let client = if config.history_limit > 0 {
            Some(MarketDataClient::new(config.client_config())?)
        } else {
            None
        };

        let selection = Selection {
            symbol: config.symbol.clone(),
            interval: config.interval.clone(),
        };
        let state = FeedState {
            chart_key: selection.chart_key(),
            price_key: selection.price_key(),
            candles: CandleBuffer::new(usize::from(MAX_HISTORY_LIMIT)),
            ticker: None,
        };

        Ok(Self {
            config,
            manager,
            client,
            selection: Mutex::new(selection),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Returns the stream metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<StreamMetrics> {
        self.manager.metrics()
    }

    /// Returns the current selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection.lock().clone()
    }

    /// Returns the key `role` is subscribed to.
    #[must_use]
    pub fn subscription(&self, role: Role) -> Option<SubscriptionKey> {
        self.manager.subscription(role)
    }

    /// Returns the latest ticker.
    #[must_use]
    pub fn ticker(&self) -> Option<Ticker> {
        self.state.lock().ticker.clone()
    }

    /// Returns a copy of the chart candles.
    #[must_use]
    pub fn candles(&self) -> CandleBuffer {
        self.state.lock().candles.clone()
    }

    /// Registers the observers, subscribes both roles and loads history.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscription is rejected.
    pub async fn start(&self) -> Result<(), FeedError> {
        self.register_observers();

        let selection = self.selection();
        info!(symbol = %selection.symbol, interval = %selection.interval, "starting feed");

        self.manager.subscribe(Role::Chart, selection.chart_key())?;
        self.manager.subscribe(Role::Price, selection.price_key())?;
        self.bootstrap(&selection, true).await;

        Ok(())
    }

    /// Applies one command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command names an invalid symbol or interval;
    /// the current streams are left untouched.
    pub async fn handle(&self, command: Command) -> Result<Control, FeedError> {
        match command {
            Command::Symbol(symbol) => {
                let next = Selection {
                    symbol,
                    ..self.selection()
                };
                self.select(next).await?;
            }
            Command::Interval(interval) => {
                let next = Selection {
                    interval,
                    ..self.selection()
                };
                self.select(next).await?;
            }
            Command::Status => self.log_report(),
            Command::Quit => return Ok(Control::Quit),
        }
        Ok(Control::Continue)
    }

    /// Parses and applies one input line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a command or the command fails.
    pub async fn handle_line(&self, line: &str) -> Result<Control, FeedError> {
        let command = line.parse::<Command>()?;
        self.handle(command).await
    }

    /// Builds a report of the feed.
    #[must_use]
    pub fn report(&self) -> FeedReport {
        // Observers hold the delivery lock while taking the state lock.
        let connections = self.manager.statuses();
        let metrics = self.manager.metrics().snapshot();
        let selection = self.selection();

        let state = self.state.lock();
        FeedReport {
            selection,
            connections,
            metrics,
            last_price: state.ticker.as_ref().map(|ticker| ticker.last_price),
            last_close: state.candles.latest().map(|kline| kline.close),
            candles: state.candles.len(),
        }
    }

    /// Stops every stream and waits for the connections to finish.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
        info!("feed stopped");
    }

    async fn select(&self, next: Selection) -> Result<(), FeedError> {
        let chart_key = next.chart_key();
        let price_key = next.price_key();
        chart_key.validate()?;
        price_key.validate()?;

        let previous = self.selection();
        if previous == next {
            debug!(symbol = %next.symbol, interval = %next.interval, "selection unchanged");
            return Ok(());
        }
        let symbol_changed = previous.symbol != next.symbol;

        {
            let mut state = self.state.lock();
            state.chart_key = chart_key.clone();
            state.candles.clear();
            if symbol_changed {
                state.price_key = price_key.clone();
                state.ticker = None;
            }
        }

        self.manager.subscribe(Role::Chart, chart_key)?;
        self.manager.subscribe(Role::Price, price_key)?;
        *self.selection.lock() = next.clone();
        info!(symbol = %next.symbol, interval = %next.interval, "selection changed");

        self.bootstrap(&next, symbol_changed).await;
        Ok(())
    }

    fn register_observers(&self) {
        let state = Arc::clone(&self.state);
        self.manager.on_message(Role::Chart, move |message| {
            let mut state = state.lock();
            if message.key != state.chart_key {
                return;
            }
            if let StreamEvent::Kline(kline) = message.event {
                debug!(
                    symbol = %kline.symbol,
                    interval = %kline.interval,
                    close = %kline.close,
                    closed = kline.is_closed,
                    "candle"
                );
                state.candles.apply(kline);
            }
        });

        let state = Arc::clone(&self.state);
        self.manager.on_message(Role::Price, move |message| {
            let mut state = state.lock();
            if message.key != state.price_key {
                return;
            }
            if let StreamEvent::Ticker(ticker) = message.event {
                debug!(symbol = %ticker.symbol, price = %ticker.last_price, "ticker");
                state.ticker = Some(ticker);
            }
        });
    }

    /// Seeds the chart and price from REST. Failures are logged; the live
    /// streams keep running either way.
    async fn bootstrap(&self, selection: &Selection, include_ticker: bool) {
        let Some(client) = &self.client else {
            return;
        };

        let chart_key = selection.chart_key();
        match client.get_klines(&chart_key, self.config.history_limit).await {
            Ok(history) => {
                let mut state = self.state.lock();
                if state.chart_key == chart_key {
                    info!(key = %chart_key, candles = history.len(), "history loaded");
                    state.candles.load_history(history);
                }
            }
            Err(e) => warn!(key = %chart_key, error = %e, "failed to load history"),
        }

        if !include_ticker {
            return;
        }

        let price_key = selection.price_key();
        match client.get_ticker(&selection.symbol).await {
            Ok(ticker) => {
                let mut state = self.state.lock();
                if state.price_key == price_key && state.ticker.is_none() {
                    state.ticker = Some(ticker);
                }
            }
            Err(e) => warn!(key = %price_key, error = %e, "failed to load ticker"),
        }
    }

    fn log_report(&self) {
        let report = self.report();
        for status in &report.connections {
            info!(
                role = %status.role,
                key = %status.key,
                state = ?status.state,
                attempt = status.attempt,
                generation = status.generation,
                "connection"
            );
        }
        match serde_json::to_string(&report) {
            Ok(json) => info!(report = %json, "status"),
            Err(e) => warn!(error = %e, "failed to serialize status"),
        }
    }
}
