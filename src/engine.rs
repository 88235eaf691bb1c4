use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::indicators::{project, slope};
use crate::types::{
    Candle, Channel, Momentum, MomentumLabel, ProfitTargets, Resolution, SwingSet, Trend, Zone,
    ZoneCheck,
};

/// Stateless evaluator for the per-resolution gates of the pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalEngine;

impl SignalEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Compare the range of the latest high/low pair against the pair before.
    /// Equal ranges count as strong.
    pub fn momentum(&self, market: &str, resolution: Resolution, swings: &SwingSet) -> Momentum {
        if !swings.has_structure() {
            warn!(
                "Insufficient swings for range momentum in {} ({}): highs={}, lows={}",
                market,
                resolution,
                swings.highs.len(),
                swings.lows.len()
            );
            return Momentum {
                is_strong: false,
                label: MomentumLabel::Unknown,
            };
        }

        let (h, l) = (&swings.highs, &swings.lows);
        let previous_range = (h[h.len() - 2].price - l[l.len() - 2].price).abs();
        let latest_range = (h[h.len() - 1].price - l[l.len() - 1].price).abs();

        let is_strong = latest_range >= previous_range;
        let label = if is_strong {
            MomentumLabel::Strong
        } else {
            MomentumLabel::Weak
        };
        debug!("Range momentum for {} ({}): {:?}", market, resolution, label);

        Momentum { is_strong, label }
    }

    /// True when the close crossed a projected channel line between the two
    /// latest candles.
    pub fn breakout(&self, market: &str, resolution: Resolution, candles: &[Candle], channel: Option<&Channel>) -> bool {
        let Some(channel) = channel else {
            info!("{} ({}): no channel, breakout check skipped", market, resolution);
            return false;
        };
        if candles.len() < 2 {
            info!("{} ({}): fewer than 2 candles, breakout check skipped", market, resolution);
            return false;
        }

        let period = resolution.period_minutes();
        let last = &candles[candles.len() - 1];
        let prev = &candles[candles.len() - 2];

        let support_slope = slope(&channel.support.0, &channel.support.1, period);
        let resistance_slope = slope(&channel.resistance.0, &channel.resistance.1, period);

        let resistance_at = |c: &Candle| project(&channel.resistance.1, resistance_slope, c.open_time, period);
        let support_at = |c: &Candle| project(&channel.support.1, support_slope, c.open_time, period);

        if prev.close <= resistance_at(prev) && last.close > resistance_at(last) {
            info!("{} ({}): channel breakout upward", market, resolution);
            return true;
        }
        if prev.close >= support_at(prev) && last.close < support_at(last) {
            info!("{} ({}): channel breakout downward", market, resolution);
            return true;
        }
        false
    }

    /// Locate `price` against the band derived from the channel.
    ///
    /// With a two-point channel the band edges coincide with the latest
    /// support and resistance prices.
    pub fn zone_check(
        &self,
        trend: Trend,
        channel: Option<&Channel>,
        price: Decimal,
        prior_swings: Option<&SwingSet>,
    ) -> ZoneCheck {
        let Some(channel) = channel else {
            return ZoneCheck {
                pass: false,
                zone: Zone::Neutral,
                saw_new_swing: false,
            };
        };

        let support = channel.support_price();
        let resistance = channel.resistance_price();
        let diameter = (resistance - support).abs();
        let mid = (support + resistance) / dec!(2);
        let overbought = mid + diameter / dec!(2);
        let oversold = mid - diameter / dec!(2);

        let saw_new_swing = match prior_swings {
            Some(prior) => {
                prior.last_high() != Some(&channel.resistance.1) || prior.last_low() != Some(&channel.support.1)
            }
            None => true,
        };

        let (pass, zone) = match trend {
            Trend::UpTrend if price <= oversold => (true, Zone::Oversold),
            Trend::DownTrend if price >= overbought => (true, Zone::Overbought),
            _ => (false, Zone::Neutral),
        };

        ZoneCheck {
            pass,
            zone,
            saw_new_swing,
        }
    }

    /// Quarter of the channel diameter beyond the boundary the trend rests on
    pub fn stop_loss(&self, trend: Trend, channel: &Channel, diameter: Decimal) -> Option<Decimal> {
        match trend {
            Trend::UpTrend => Some(channel.support_price() - diameter / dec!(4)),
            Trend::DownTrend => Some(channel.resistance_price() + diameter / dec!(4)),
            Trend::Sideways => None,
        }
    }

    pub fn targets(&self, price: Decimal, trend: Trend, diameter: Decimal, channel: &Channel) -> ProfitTargets {
        let three_quarters = diameter * dec!(3) / dec!(4);
        if trend == Trend::UpTrend {
            ProfitTargets {
                target1: price + diameter,
                target2: price + three_quarters,
                target3: channel.resistance_price(),
            }
        } else {
            ProfitTargets {
                target1: price - diameter,
                target2: price - three_quarters,
                target3: channel.support_price(),
            }
        }
    }
}
