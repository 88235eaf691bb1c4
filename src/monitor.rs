use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connect::{CandleSource, MarketCatalog, PriceSource};
use crate::engine::SignalEngine;
use crate::mtf_analysis::MtfAnalyzer;
use crate::notify::Notifier;
use crate::policy::{CooldownManager, DEFAULT_SIGNAL_INTERVAL_SECS};
use crate::safemode::{FailureVerdict, SafeMode, DEFAULT_MAX_ERRORS};
use crate::state::MarketState;
use crate::structure::{build_trend_channel, detect_swings};
use crate::types::{Resolution, TradeSignal, Trend};

/// Stage at which a market's evaluation stopped for this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    FineTrend,
    Momentum,
    FastCandles,
    FastTrend,
    Breakout,
    Hpta,
    Price,
    Zone,
    Revalidation,
    Direction,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    FetchFailed { error_count: u32, disabled: bool },
    Stuck(Gate),
    Suppressed { remaining_secs: i64 },
    Dispatched(TradeSignal),
    DispatchFailed(TradeSignal),
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::FetchFailed {
                error_count,
                disabled: true,
            } => write!(f, "removed after {} fetch errors", error_count),
            CycleOutcome::FetchFailed { error_count, .. } => write!(f, "fetch failed ({} errors)", error_count),
            CycleOutcome::Stuck(gate) => write!(f, "stuck at {:?}", gate),
            CycleOutcome::Suppressed { remaining_secs } => {
                write!(f, "suppressed, {}s of the re-signal interval left", remaining_secs)
            }
            CycleOutcome::Dispatched(signal) => write!(f, "dispatched {}", signal),
            CycleOutcome::DispatchFailed(signal) => write!(f, "dispatch failed for {}", signal),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub candle_limit: usize,
    pub poll_interval: Duration,
    pub signal_interval_secs: i64,
    pub max_errors: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            candle_limit: 200,
            poll_interval: Duration::from_secs(180),
            signal_interval_secs: DEFAULT_SIGNAL_INTERVAL_SECS,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

/// Keep the requested markets the exchange lists. If the catalog cannot be
/// read, every requested market is kept.
pub async fn validate_markets<C: MarketCatalog + ?Sized>(catalog: &C, requested: &[String]) -> Vec<String> {
    match catalog.list_available_markets().await {
        Ok(available) => {
            let (valid, invalid): (Vec<String>, Vec<String>) =
                requested.iter().cloned().partition(|m| available.contains(m));
            info!("Available markets: {:?}", valid);
            if !invalid.is_empty() {
                warn!("Unavailable markets: {:?}", invalid);
            }
            valid
        }
        Err(e) => {
            warn!("Error checking markets: {}", e);
            requested.to_vec()
        }
    }
}

/// Polls every active market once per cycle and dispatches qualifying signals
pub struct Monitor<F, N> {
    feed: F,
    notifier: N,
    markets: Vec<MarketState>,
    engine: SignalEngine,
    mtf: MtfAnalyzer,
    safe_mode: SafeMode,
    cooldown: CooldownManager,
    settings: MonitorSettings,
    cycle_count: u64,
}

impl<F, N> Monitor<F, N>
where
    F: CandleSource + PriceSource,
    N: Notifier,
{
    pub fn new(feed: F, notifier: N, markets: Vec<String>, settings: MonitorSettings) -> Self {
        Self {
            feed,
            notifier,
            markets: markets.into_iter().map(MarketState::new).collect(),
            engine: SignalEngine::new(),
            mtf: MtfAnalyzer::new(),
            safe_mode: SafeMode::with_config(settings.max_errors),
            cooldown: CooldownManager::with_interval_secs(settings.signal_interval_secs),
            settings,
            cycle_count: 0,
        }
    }

    pub fn active_markets(&self) -> Vec<&str> {
        self.markets.iter().map(|s| s.market.as_str()).collect()
    }

    /// Poll until `shutdown` resolves, sleeping the poll interval between cycles
    pub async fn run<S: Future<Output = ()>>(&mut self, shutdown: S) {
        tokio::pin!(shutdown);

        loop {
            let finished = tokio::select! {
                result = self.run_cycle(Utc::now()) => Some(result),
                _ = &mut shutdown => None,
            };

            match finished {
                None => {
                    info!("Program stopped by user.");
                    return;
                }
                Some(Ok(outcomes)) => {
                    let dispatched = outcomes
                        .iter()
                        .filter(|(_, o)| matches!(o, CycleOutcome::Dispatched(_)))
                        .count();
                    info!(
                        "Cycle {} complete: {} signals sent, {} active markets",
                        self.cycle_count,
                        dispatched,
                        self.markets.len()
                    );
                }
                Some(Err(e)) => error!("General error in main loop: {:#}", e),
            }

            info!("Waiting {} seconds until next cycle...", self.settings.poll_interval.as_secs());
            tokio::select! {
                _ = sleep(self.settings.poll_interval) => {}
                _ = &mut shutdown => {
                    info!("Program stopped by user.");
                    return;
                }
            }
        }
    }

    /// One pass over every active market, in order. Markets that hit the
    /// error limit are dropped afterwards.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> anyhow::Result<Vec<(String, CycleOutcome)>> {
        if self.markets.is_empty() {
            return Err(anyhow!("no active markets left"));
        }
        self.cycle_count += 1;

        let mut markets = std::mem::take(&mut self.markets);
        let mut outcomes = Vec::with_capacity(markets.len());

        for state in markets.iter_mut() {
            info!("{} - {}", now.format("%H:%M:%S"), state.market);
            match self.evaluate_market(state, now).await {
                Ok(outcome) => {
                    debug!("{}: {}", state.market, outcome);
                    outcomes.push((state.market.clone(), outcome));
                }
                Err(e) => error!("Error processing {}: {:#}", state.market, e),
            }
        }

        markets.retain(|state| {
            !outcomes
                .iter()
                .any(|(m, o)| m == &state.market && matches!(o, CycleOutcome::FetchFailed { disabled: true, .. }))
        });
        self.markets = markets;

        Ok(outcomes)
    }

    async fn evaluate_market(&self, state: &mut MarketState, now: DateTime<Utc>) -> anyhow::Result<CycleOutcome> {
        let market = state.market.clone();
        let limit = self.settings.candle_limit;

        // Fine resolution: the only fetch that counts toward removal
        let fine_candles = match self.feed.fetch_candles(&market, Resolution::Fine, limit).await {
            Ok(candles) => {
                self.safe_mode.record_success(state);
                candles
            }
            Err(e) => {
                warn!("M15 fetch for {} failed: {}", market, e);
                let outcome = match self.safe_mode.record_failure(state) {
                    FailureVerdict::Retry { error_count } => CycleOutcome::FetchFailed {
                        error_count,
                        disabled: false,
                    },
                    FailureVerdict::Disable { error_count } => CycleOutcome::FetchFailed {
                        error_count,
                        disabled: true,
                    },
                };
                return Ok(outcome);
            }
        };

        let (swings_fine, new_fine) = detect_swings(
            &market,
            Resolution::Fine,
            &fine_candles,
            state.swings(Resolution::Fine).cloned(),
        );
        state.store_swings(Resolution::Fine, swings_fine.clone());

        let trend_fine = match build_trend_channel(&market, Resolution::Fine, &swings_fine) {
            Some((trend, _)) if trend.is_directional() => trend,
            other => {
                info!(
                    "M15 trend for {} not detected or non-trending ({:?}). Stuck at trend_m15",
                    market,
                    other.map(|(t, _)| t)
                );
                return Ok(CycleOutcome::Stuck(Gate::FineTrend));
            }
        };

        let momentum = self.engine.momentum(&market, Resolution::Fine, &swings_fine);
        if !momentum.is_strong {
            info!("{}: {:?} momentum in M15. Stuck at momentum", market, momentum.label);
            return Ok(CycleOutcome::Stuck(Gate::Momentum));
        }

        // Fast resolution: failures here abort quietly
        let fast_candles = match self.feed.fetch_candles(&market, Resolution::Fast, limit).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!("M3 data for {} not received: {}", market, e);
                return Ok(CycleOutcome::Stuck(Gate::FastCandles));
            }
        };

        let prior_fast = state.swings(Resolution::Fast).cloned();
        let (swings_fast, _) = detect_swings(&market, Resolution::Fast, &fast_candles, prior_fast.clone());
        state.store_swings(Resolution::Fast, swings_fast.clone());

        let Some((trend_fast, channel_fast)) = build_trend_channel(&market, Resolution::Fast, &swings_fast) else {
            info!("{}: M3 trend not detected. Stuck at trend_m3", market);
            return Ok(CycleOutcome::Stuck(Gate::FastTrend));
        };

        if self
            .engine
            .breakout(&market, Resolution::Fast, &fast_candles, Some(&channel_fast))
        {
            info!("{}: Channel breakout in M3. Stuck at breakout", market);
            return Ok(CycleOutcome::Stuck(Gate::Breakout));
        }

        if !self.mtf.hpta_aligned(&market, trend_fine, trend_fast) {
            return Ok(CycleOutcome::Stuck(Gate::Hpta));
        }

        let price = match self.feed.fetch_last_price(&market).await {
            Ok(price) => price,
            Err(e) => {
                warn!("Error getting ticker for {}: {}", market, e);
                return Ok(CycleOutcome::Stuck(Gate::Price));
            }
        };

        let zone = self
            .engine
            .zone_check(trend_fast, Some(&channel_fast), price, prior_fast.as_ref());
        if !zone.pass {
            info!("{}: zone condition not passed. Waiting to reach suitable zone.", market);
            return Ok(CycleOutcome::Stuck(Gate::Zone));
        }

        // Confirmation pass over the trends and momentum already accepted above
        if zone.saw_new_swing {
            info!("{}: New SH/SL detected. Re-checking algorithms...", market);
            if !self.mtf.hpta_aligned(&market, trend_fine, trend_fast) {
                return Ok(CycleOutcome::Stuck(Gate::Revalidation));
            }
            if new_fine && !self.engine.momentum(&market, Resolution::Fine, &swings_fine).is_strong {
                info!("{}: Weak momentum in M15. Not continuing.", market);
                return Ok(CycleOutcome::Stuck(Gate::Revalidation));
            }
        }

        let trend_coarse = self.coarse_trend(state, limit).await;

        let Some(direction) = self.mtf.direction(trend_fine, trend_fast) else {
            return Ok(CycleOutcome::Stuck(Gate::Direction));
        };
        let risk = self.mtf.risk(direction, trend_coarse);

        if self.cooldown.is_on_cooldown(state, now) {
            let remaining_secs = self.cooldown.remaining(state, now);
            info!(
                "Signal for {} rejected, {}s left of the re-signal interval",
                market, remaining_secs
            );
            return Ok(CycleOutcome::Suppressed { remaining_secs });
        }

        let current_price = match self.feed.fetch_last_price(&market).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Ticker refresh for {} failed, using zone price {}: {}", market, price, e);
                price
            }
        };
        let diameter = channel_fast.diameter();
        let stop_loss = self
            .engine
            .stop_loss(trend_fast, &channel_fast, diameter)
            .ok_or_else(|| anyhow!("no stop loss for {} trend", trend_fast))?;
        let targets = self.engine.targets(current_price, trend_fast, diameter, &channel_fast);

        let signal = TradeSignal {
            signal_id: Uuid::new_v4().to_string(),
            market: market.clone(),
            direction,
            risk,
            trend_coarse,
            trend_fine,
            trend_fast,
            momentum_strong: momentum.is_strong,
            hpta_aligned: true,
            zone: zone.zone,
            stop_loss,
            targets,
            price: current_price,
            timestamp: now,
        };

        match self.notifier.send(&signal.to_message()).await {
            Ok(()) => {
                self.cooldown.record_signal(state, now);
                info!("{} sent", signal);
                Ok(CycleOutcome::Dispatched(signal))
            }
            Err(e) => {
                error!("Sending signal {} for {} was unsuccessful: {}", direction, market, e);
                Ok(CycleOutcome::DispatchFailed(signal))
            }
        }
    }

    /// Best effort; anything short of a detected trend reads as sideways
    async fn coarse_trend(&self, state: &mut MarketState, limit: usize) -> Trend {
        let candles = match self.feed.fetch_candles(&state.market, Resolution::Coarse, limit).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!("1H data for {} not received, assuming sideway: {}", state.market, e);
                return Trend::Sideways;
            }
        };

        let (swings, _) = detect_swings(
            &state.market,
            Resolution::Coarse,
            &candles,
            state.swings(Resolution::Coarse).cloned(),
        );
        let trend = build_trend_channel(&state.market, Resolution::Coarse, &swings)
            .map(|(trend, _)| trend)
            .unwrap_or(Trend::Sideways);
        state.store_swings(Resolution::Coarse, swings);
        trend
    }

    #[cfg(test)]
    fn market_state(&self, market: &str) -> Option<&MarketState> {
        self.markets.iter().find(|s| s.market == market)
    }
}
