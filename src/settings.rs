use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::connect::RetryPolicy;

#[derive(Debug, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_signal_interval")]
    pub signal_interval_secs: i64,
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_error_log")]
    pub error_log: String,
}

#[derive(Debug, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_markets")]
    pub markets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
}

fn default_poll_interval() -> u64 { 180 }
fn default_signal_interval() -> i64 { 180 }
fn default_max_errors() -> u32 { 5 }
fn default_candle_limit() -> usize { 200 }
fn default_log_level() -> String { "info".to_string() }
fn default_error_log() -> String { "error_log.txt".to_string() }
fn default_base_url() -> String { "https://api.coinex.com/perpetual/v1".to_string() }
fn default_retries() -> u32 { 5 }
fn default_retry_delay() -> u64 { 20 }
fn default_timeout() -> u64 { 10 }
fn default_min_candles() -> usize { 10 }

fn default_markets() -> Vec<String> {
    [
        "ETHUSDT", "BTCUSDT", "SOLUSDT", "ADAUSDT", "DOGEUSDT", "XRPUSDT", "BNBUSDT", "LINKUSDT", "SHIBUSDT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            signal_interval_secs: default_signal_interval(),
            max_errors: default_max_errors(),
            candle_limit: default_candle_limit(),
            log_level: default_log_level(),
            error_log: default_error_log(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            markets: default_markets(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay(),
            timeout_secs: default_timeout(),
            min_candles: default_min_candles(),
        }
    }
}

impl ExchangeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retries,
            delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl AppSettings {
    /// `config.toml` (optional) overlaid with `HPTA__SECTION__KEY` variables
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("HPTA")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("trading.markets"),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> AppSettings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let settings = parse("");
        assert_eq!(settings.app.poll_interval_secs, 180);
        assert_eq!(settings.app.max_errors, 5);
        assert_eq!(settings.trading.markets.len(), 9);
        assert_eq!(settings.exchange.retries, 5);
        assert!(settings.telegram.token.is_empty());
    }

    #[test]
    fn test_overrides() {
        let settings = parse(
            r#"
            [app]
            poll_interval_secs = 60

            [trading]
            markets = ["BTCUSDT"]

            [exchange]
            retry_delay_secs = 1
            "#,
        );
        assert_eq!(settings.app.poll_interval_secs, 60);
        assert_eq!(settings.app.signal_interval_secs, 180);
        assert_eq!(settings.trading.markets, vec!["BTCUSDT".to_string()]);

        let retry = settings.exchange.retry_policy();
        assert_eq!(retry.delay, Duration::from_secs(1));
        assert_eq!(retry.timeout, Duration::from_secs(10));
    }
}
