//! HTTP client implementation.
//!
//! Provides the REST client used to bootstrap feeds before live data arrives.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::config::ClientConfig;
use super::error::ClientError;
use crate::error::SdkError;
use crate::types::market::{parse_decimal, timestamp_from_millis};
use crate::types::{Channel, Kline, SubscriptionKey, Ticker};

/// Maximum klines the API returns per request.
pub const MAX_KLINES_PER_REQUEST: u16 = 1_000;

/// API error response format.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: i64,
    msg: String,
}

/// One kline row: `[openTime, open, high, low, close, volume, closeTime,
/// quoteVolume, trades, takerBase, takerQuote, ignore]`.
#[derive(Debug, Deserialize)]
struct KlineRow(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    String,
);

/// 24h ticker response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerResponse {
    symbol: String,
    last_price: String,
    open_price: String,
    high_price: String,
    low_price: String,
    volume: String,
    price_change_percent: String,
    close_time: i64,
}

impl KlineRow {
    fn into_kline(self, symbol: &str, interval: &str) -> Result<Kline, SdkError> {
        Ok(Kline {
            symbol: symbol.to_ascii_uppercase(),
            interval: interval.to_string(),
            open_time: timestamp_from_millis(self.0)?,
            close_time: timestamp_from_millis(self.6)?,
            open: parse_decimal(&self.1)?,
            high: parse_decimal(&self.2)?,
            low: parse_decimal(&self.3)?,
            close: parse_decimal(&self.4)?,
            volume: parse_decimal(&self.5)?,
            is_closed: true,
            event_time: None,
        })
    }
}

impl TryFrom<TickerResponse> for Ticker {
    type Error = SdkError;

    fn try_from(value: TickerResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            symbol: value.symbol,
            last_price: parse_decimal(&value.last_price)?,
            open: Some(parse_decimal(&value.open_price)?),
            high: Some(parse_decimal(&value.high_price)?),
            low: Some(parse_decimal(&value.low_price)?),
            volume: Some(parse_decimal(&value.volume)?),
            price_change_percent: Some(parse_decimal(&value.price_change_percent)?),
            event_time: Some(timestamp_from_millis(value.close_time)?),
        })
    }
}

/// Marks the newest kline open while its close time has not passed.
fn mark_open_candle(klines: &mut [Kline], now: DateTime<Utc>) {
    if let Some(last) = klines.last_mut() {
        last.is_closed = last.close_time < now;
    }
}

/// Builds the klines request path for a kline key.
fn klines_path(key: &SubscriptionKey, limit: u16) -> Result<String, ClientError> {
    key.validate()?;
    let interval = match (key.channel(), key.interval()) {
        (Channel::Kline, Some(interval)) => interval,
        _ => return Err(ClientError::InvalidRequest(SdkError::MissingInterval)),
    };
    Ok(format!(
        "/api/v3/klines?symbol={}&interval={}&limit={}",
        key.symbol().to_ascii_uppercase(),
        interval,
        limit.clamp(1, MAX_KLINES_PER_REQUEST)
    ))
}

/// Builds the 24h ticker request path.
fn ticker_path(symbol: &str) -> Result<String, ClientError> {
    SubscriptionKey::ticker(symbol).validate()?;
    Ok(format!(
        "/api/v3/ticker/24hr?symbol={}",
        symbol.to_ascii_uppercase()
    ))
}

/// HTTP client for the market-data REST API.
#[derive(Debug, Clone)]
pub struct MarketDataClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl MarketDataClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self { config, http })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Makes a GET request to the given path.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        debug!(%url, "GET");
        self.request_with_retry(|| self.http.get(&url)).await
    }

    /// Makes a request with retry logic.
    async fn request_with_retry<T, F>(&self, request_fn: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            let response = request_fn().send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body = resp
                            .text()
                            .await
                            .map_err(|e| ClientError::Deserialization(e.to_string()))?;

                        return serde_json::from_str(&body)
                            .map_err(|e| ClientError::Deserialization(e.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());

                        if retry_count < self.config.max_retries {
                            let wait_time = retry_after.unwrap_or(1);
                            tokio::time::sleep(Duration::from_secs(wait_time)).await;
                            retry_count += 1;
                            continue;
                        }

                        return Err(ClientError::RateLimited { retry_after });
                    }

                    let body = resp.text().await.unwrap_or_default();
                    if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                        return Err(ClientError::Api {
                            code: error_resp.code.to_string(),
                            message: error_resp.msg,
                        });
                    }

                    return Err(ClientError::Api {
                        code: status.as_str().to_string(),
                        message: body,
                    });
                }
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_millis(100 * (1 << retry_count))).await;
                        last_error = Some(ClientError::from(e));
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::Timeout))
    }

    /// Gets the most recent klines for a kline key, oldest first.
    ///
    /// # Arguments
    ///
    /// * `key` - A kline subscription key
    /// * `limit` - Number of klines (clamped to 1..=1000)
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid kline key, the request
    /// fails, or a row cannot be decoded.
    pub async fn get_klines(
        &self,
        key: &SubscriptionKey,
        limit: u16,
    ) -> Result<Vec<Kline>, ClientError> {
        let path = klines_path(key, limit)?;
        let rows: Vec<KlineRow> = self.get(&path).await?;
        let interval = key.interval().unwrap_or_default();

        let mut klines = rows
            .into_iter()
            .map(|row| row.into_kline(key.symbol(), interval))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ClientError::Deserialization(e.to_string()))?;
        klines.sort_unstable_by_key(|kline| kline.open_time);
        klines.dedup_by_key(|kline| kline.open_time);
        mark_open_candle(&mut klines, Utc::now());
        Ok(klines)
    }

    /// Gets the 24h ticker for a symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is invalid, the request fails, or the
    /// response cannot be decoded.
    pub async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ClientError> {
        let path = ticker_path(symbol)?;
        let response: TickerResponse = self.get(&path).await?;
        Ticker::try_from(response).map_err(|e| ClientError::Deserialization(e.to_string()))
    }
}
