mod connect;
mod engine;
mod error;
mod indicators;
mod logging;
mod monitor;
mod mtf_analysis;
mod notify;
mod policy;
mod safemode;
mod settings;
mod state;
mod structure;
mod types;

use std::time::Duration;
use tracing::{error, info, warn};

use crate::connect::CoinExClient;
use crate::monitor::{validate_markets, Monitor, MonitorSettings};
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::settings::AppSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let conf = AppSettings::load()?;
    let _guard = logging::init(&conf.app.log_level, &conf.app.error_log)?;

    info!("🚀 HPTA swing-channel monitor starting...");
    info!("Settings loaded: {} markets requested", conf.trading.markets.len());

    let client = CoinExClient::new(
        &conf.exchange.base_url,
        conf.exchange.retry_policy(),
        conf.exchange.min_candles,
    )?;

    let notifier: Box<dyn Notifier> = match TelegramNotifier::new(
        &conf.telegram.token,
        &conf.telegram.chat_id,
        conf.exchange.retry_policy(),
    ) {
        Ok(telegram) => Box::new(telegram),
        Err(e) => {
            warn!("Telegram disabled, signals go to the log only: {}", e);
            Box::new(LogNotifier)
        }
    };

    let announcement = format!(
        "🚀 Monitoring started for {} CoinEx futures markets\n{}",
        conf.trading.markets.len(),
        conf.trading.markets.join(", ")
    );
    if let Err(e) = notifier.send(&announcement).await {
        error!("Startup announcement failed: {}", e);
    }

    let markets = validate_markets(&client, &conf.trading.markets).await;
    if markets.is_empty() {
        error!("No valid markets found.");
        anyhow::bail!("none of the requested markets are available");
    }

    let settings = MonitorSettings {
        candle_limit: conf.app.candle_limit,
        poll_interval: Duration::from_secs(conf.app.poll_interval_secs),
        signal_interval_secs: conf.app.signal_interval_secs,
        max_errors: conf.app.max_errors,
    };
    let mut monitor = Monitor::new(client, notifier, markets, settings);
    info!("Monitoring {:?}", monitor.active_markets());

    monitor
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
