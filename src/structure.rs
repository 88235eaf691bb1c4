// =============================================================================
// MARKET STRUCTURE: swing detection, trend & channel
// =============================================================================

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::indicators::{is_swing_high, is_swing_low};
use crate::types::{Candle, Channel, Resolution, SwingPoint, SwingSet, Trend};

/// Fewest candles that can hold a single fractal
pub const MIN_SWING_CANDLES: usize = 5;

/// Re-scan the most recent candles and merge any new turning points into
/// `previous`.
///
/// Returns the updated set and whether at least one point was accepted.
pub fn detect_swings(
    market: &str,
    resolution: Resolution,
    candles: &[Candle],
    previous: Option<SwingSet>,
) -> (SwingSet, bool) {
    let mut swings = previous.unwrap_or_default();

    if candles.len() < MIN_SWING_CANDLES {
        warn!(
            "Insufficient data to detect swings in {} ({}): {} candles",
            market,
            resolution,
            candles.len()
        );
        return (swings, false);
    }

    let start = candles.len().saturating_sub(resolution.swing_window());
    let highs: Vec<Decimal> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<Decimal> = candles.iter().map(|c| c.low).collect();

    let mut found = false;
    for i in (start + 2)..candles.len() - 2 {
        if is_swing_high(&highs, i) {
            let point = SwingPoint::new(candles[i].open_time, highs[i]);
            found |= merge_swing(&mut swings.highs, &swings.lows, point);
        }
        if is_swing_low(&lows, i) {
            let point = SwingPoint::new(candles[i].open_time, lows[i]);
            found |= merge_swing(&mut swings.lows, &swings.highs, point);
        }
    }

    debug!(
        "Detected swings for {} ({}): highs={}, lows={}",
        market,
        resolution,
        swings.highs.len(),
        swings.lows.len()
    );
    (swings, found)
}

/// Append `point` to `same`, replacing the last entry when no opposite swing
/// lies strictly between the two. Points not newer than the last entry are
/// ignored.
fn merge_swing(same: &mut Vec<SwingPoint>, opposite: &[SwingPoint], point: SwingPoint) -> bool {
    if let Some(last) = same.last() {
        if point.time <= last.time {
            return false;
        }
        let separated = opposite
            .iter()
            .any(|o| o.time > last.time && o.time < point.time);
        if !separated {
            same.pop();
        }
    }
    same.push(point);
    true
}

/// Classify the trend from the last two highs and lows and draw the channel
/// through them. `None` until two of each exist.
pub fn build_trend_channel(market: &str, resolution: Resolution, swings: &SwingSet) -> Option<(Trend, Channel)> {
    if !swings.has_structure() {
        warn!(
            "Insufficient swings to detect trend in {} ({}): highs={}, lows={}",
            market,
            resolution,
            swings.highs.len(),
            swings.lows.len()
        );
        return None;
    }

    let prev_high = swings.highs[swings.highs.len() - 2];
    let last_high = swings.highs[swings.highs.len() - 1];
    let prev_low = swings.lows[swings.lows.len() - 2];
    let last_low = swings.lows[swings.lows.len() - 1];

    let trend = if last_low.price > prev_low.price && last_high.price > prev_high.price {
        Trend::UpTrend
    } else if last_low.price < prev_low.price && last_high.price < prev_high.price {
        Trend::DownTrend
    } else {
        Trend::Sideways
    };

    debug!("Detected trend for {} ({}): {}", market, resolution, trend);

    Some((
        trend,
        Channel {
            support: (prev_low, last_low),
            resistance: (prev_high, last_high),
        },
    ))
}
