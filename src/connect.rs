use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FeedError, FeedResult, Retryable};
use crate::types::{candle_from_row, decimal_from_value, ApiEnvelope, Candle, MarketInfo, Resolution};

// =============================================================================
// CAPABILITIES
// =============================================================================

#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Candles ordered by open time, oldest first
    async fn fetch_candles(&self, market: &str, resolution: Resolution, limit: usize) -> FeedResult<Vec<Candle>>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_last_price(&self, market: &str) -> FeedResult<Decimal>;
}

#[async_trait]
pub trait MarketCatalog: Send + Sync {
    async fn list_available_markets(&self) -> FeedResult<HashSet<String>>;
}

// =============================================================================
// RETRY POLICY
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Upper bound for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(20),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempts run out, sleeping `delay`
    /// between attempts. Errors that are not retryable return at once.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.timeout.as_secs())),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    warn!("{} failed (attempt {}/{}), not retrying: {}", label, attempt, max_attempts, e);
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!("{} failed on final attempt {}/{}: {}", label, attempt, max_attempts, e);
                    return Err(E::exhausted(attempt, e));
                }
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {}", label, attempt, max_attempts, e);
                    info!("Retrying {} after {} seconds...", label, self.delay.as_secs());
                    sleep(self.delay).await;
                }
            }
        }
    }
}

// =============================================================================
// COINEX PERPETUAL REST CLIENT
// =============================================================================

pub struct CoinExClient {
    base_url: Url,
    client: reqwest::Client,
    retry: RetryPolicy,
    min_candles: usize,
}

impl CoinExClient {
    pub fn new(base_url: &str, retry: RetryPolicy, min_candles: usize) -> FeedResult<Self> {
        // Url::join drops the last path segment unless the base ends with '/'
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{}/", base_url))?
        };
        let client = reqwest::Client::builder().timeout(retry.timeout).build()?;

        Ok(Self {
            base_url,
            client,
            retry,
            min_candles,
        })
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> FeedResult<T> {
        let url = self.base_url.join(path)?;
        let resp = self.client.get(url).query(params).send().await?;
        let envelope: ApiEnvelope<T> = resp.json().await?;

        if envelope.code != 0 {
            return Err(FeedError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope
            .data
            .ok_or_else(|| FeedError::MalformedPayload(format!("{} returned no data", path)))
    }

    async fn fetch_candles_once(&self, market: &str, resolution: Resolution, limit: usize) -> FeedResult<Vec<Candle>> {
        let params = [
            ("market", market.to_string()),
            ("type", resolution.wire_name().to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<Vec<serde_json::Value>> = self.get_data("market/kline", &params).await?;

        let mut candles = rows
            .iter()
            .map(|row| {
                candle_from_row(row).ok_or_else(|| FeedError::MalformedPayload(format!("bad kline row: {:?}", row)))
            })
            .collect::<FeedResult<Vec<_>>>()?;
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);

        debug!("Candles count for {} ({}): {}", market, resolution, candles.len());
        if candles.len() < self.min_candles {
            return Err(FeedError::InsufficientData {
                market: market.to_string(),
                resolution,
                count: candles.len(),
            });
        }
        Ok(candles)
    }

    async fn fetch_last_price_once(&self, market: &str) -> FeedResult<Decimal> {
        let params = [("market", market.to_string())];
        let data: serde_json::Value = self.get_data("market/ticker", &params).await?;

        data.get("ticker")
            .and_then(|t| t.get("last"))
            .or_else(|| data.get("last"))
            .and_then(decimal_from_value)
            .ok_or_else(|| FeedError::MalformedPayload(format!("unknown ticker structure for {}: {}", market, data)))
    }
}

#[async_trait]
impl CandleSource for CoinExClient {
    async fn fetch_candles(&self, market: &str, resolution: Resolution, limit: usize) -> FeedResult<Vec<Candle>> {
        let label = format!("klines {} ({})", market, resolution);
        self.retry
            .run(&label, || self.fetch_candles_once(market, resolution, limit))
            .await
    }
}

#[async_trait]
impl PriceSource for CoinExClient {
    async fn fetch_last_price(&self, market: &str) -> FeedResult<Decimal> {
        let label = format!("ticker {}", market);
        self.retry.run(&label, || self.fetch_last_price_once(market)).await
    }
}

#[async_trait]
impl MarketCatalog for CoinExClient {
    async fn list_available_markets(&self) -> FeedResult<HashSet<String>> {
        let markets: Vec<MarketInfo> = timeout(self.retry.timeout, self.get_data("market/list", &[]))
            .await
            .map_err(|_| FeedError::Timeout {
                secs: self.retry.timeout.as_secs(),
            })??;
        Ok(markets.into_iter().map(|m| m.name).collect())
    }
}
