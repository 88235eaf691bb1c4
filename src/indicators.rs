use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::SwingPoint;

// Fractal detection
// A swing needs two confirmed candles on each side, so the newest two
// candles of any fetch can never be swings yet.

pub fn is_swing_high(highs: &[Decimal], idx: usize) -> bool {
    if idx < 2 || idx + 2 >= highs.len() {
        return false;
    }
    let current = highs[idx];
    highs[idx - 2..idx].iter().all(|&h| current > h)
        && highs[idx + 1..=idx + 2].iter().all(|&h| current > h)
}

pub fn is_swing_low(lows: &[Decimal], idx: usize) -> bool {
    if idx < 2 || idx + 2 >= lows.len() {
        return false;
    }
    let current = lows[idx];
    lows[idx - 2..idx].iter().all(|&l| current < l)
        && lows[idx + 1..=idx + 2].iter().all(|&l| current < l)
}

/// Price change per candle period between two swing points.
///
/// Returns zero when both points share a timestamp.
pub fn slope(p1: &SwingPoint, p2: &SwingPoint, period_minutes: i64) -> Decimal {
    let periods = periods_between(p1.time, p2.time, period_minutes);
    if periods.is_zero() {
        return Decimal::ZERO;
    }
    (p2.price - p1.price) / periods
}

/// Line price at `at`, extended from `anchor` with the given per-period slope
pub fn project(anchor: &SwingPoint, slope: Decimal, at: DateTime<Utc>, period_minutes: i64) -> Decimal {
    anchor.price + slope * periods_between(anchor.time, at, period_minutes)
}

fn periods_between(from: DateTime<Utc>, to: DateTime<Utc>, period_minutes: i64) -> Decimal {
    let seconds = to.signed_duration_since(from).num_seconds();
    let period_seconds = 60 * period_minutes.max(1);
    Decimal::from(seconds) / Decimal::from(period_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn point(secs: i64, price: Decimal) -> SwingPoint {
        SwingPoint::new(Utc.timestamp_opt(secs, 0).unwrap(), price)
    }

    #[test]
    fn test_swing_high_requires_two_lower_neighbours() {
        let highs = [dec!(1), dec!(2), dec!(5), dec!(3), dec!(4)];
        assert!(is_swing_high(&highs, 2));

        let tied = [dec!(1), dec!(5), dec!(5), dec!(3), dec!(4)];
        assert!(!is_swing_high(&tied, 2));

        // Edges never qualify
        assert!(!is_swing_high(&highs, 1));
        assert!(!is_swing_high(&highs, 3));
    }

    #[test]
    fn test_swing_low_requires_two_higher_neighbours() {
        let lows = [dec!(5), dec!(4), dec!(1), dec!(3), dec!(2)];
        assert!(is_swing_low(&lows, 2));

        let broken = [dec!(5), dec!(4), dec!(1), dec!(3), dec!(0.5)];
        assert!(!is_swing_low(&broken, 2));
    }

    #[test]
    fn test_slope_per_period() {
        // 30 minutes apart on a 3 minute chart = 10 periods
        let p1 = point(0, dec!(100));
        let p2 = point(1800, dec!(120));
        assert_eq!(slope(&p1, &p2, 3), dec!(2));
    }

    #[test]
    fn test_slope_degenerate_time() {
        let p1 = point(600, dec!(100));
        let p2 = point(600, dec!(150));
        assert_eq!(slope(&p1, &p2, 15), Decimal::ZERO);
    }

    #[test]
    fn test_project_forward() {
        let anchor = point(0, dec!(100));
        let at = Utc.timestamp_opt(900, 0).unwrap(); // 5 periods of 3m
        assert_eq!(project(&anchor, dec!(-1.5), at, 3), dec!(92.5));
    }
}
