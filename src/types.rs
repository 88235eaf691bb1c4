use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CANDLES & RESOLUTIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// The three candle periods the monitor polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Fine,   // 15m, primary trend
    Fast,   // 3m, entry timing
    Coarse, // 1h, risk grading only
}

impl Resolution {
    pub fn period_minutes(&self) -> i64 {
        match self {
            Resolution::Fine => 15,
            Resolution::Fast => 3,
            Resolution::Coarse => 60,
        }
    }

    /// Number of most recent candles re-scanned for swings on every cycle
    pub fn swing_window(&self) -> usize {
        match self {
            Resolution::Fine | Resolution::Fast => 50,
            Resolution::Coarse => 10,
        }
    }

    /// Kline type parameter understood by the exchange
    pub fn wire_name(&self) -> &'static str {
        match self {
            Resolution::Fine => "15min",
            Resolution::Fast => "3min",
            Resolution::Coarse => "1hour",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Fine => write!(f, "M15"),
            Resolution::Fast => write!(f, "M3"),
            Resolution::Coarse => write!(f, "1H"),
        }
    }
}

// =============================================================================
// MARKET STRUCTURE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub time: DateTime<Utc>,
    pub price: Decimal,
}

impl SwingPoint {
    pub fn new(time: DateTime<Utc>, price: Decimal) -> Self {
        Self { time, price }
    }
}

/// Swing highs and lows of one market at one resolution, oldest first.
///
/// Only the swing detector pushes into a set, which keeps both sequences
/// strictly increasing in time and alternating with the opposite polarity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwingSet {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
}

impl SwingSet {
    pub fn last_high(&self) -> Option<&SwingPoint> {
        self.highs.last()
    }

    pub fn last_low(&self) -> Option<&SwingPoint> {
        self.lows.last()
    }

    /// At least two highs and two lows, the minimum for trend and momentum.
    pub fn has_structure(&self) -> bool {
        self.highs.len() >= 2 && self.lows.len() >= 2
    }
}

/// Support and resistance lines through the two latest swing lows and highs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub support: (SwingPoint, SwingPoint),    // (prev_low, last_low)
    pub resistance: (SwingPoint, SwingPoint), // (prev_high, last_high)
}

impl Channel {
    pub fn support_price(&self) -> Decimal {
        self.support.1.price
    }

    pub fn resistance_price(&self) -> Decimal {
        self.resistance.1.price
    }

    /// Distance between the latest resistance and support prices
    pub fn diameter(&self) -> Decimal {
        (self.resistance_price() - self.support_price()).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    UpTrend,
    DownTrend,
    Sideways,
}

impl Trend {
    pub fn is_directional(&self) -> bool {
        !matches!(self, Trend::Sideways)
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::UpTrend => write!(f, "up trend"),
            Trend::DownTrend => write!(f, "down trend"),
            Trend::Sideways => write!(f, "sideway"),
        }
    }
}

// =============================================================================
// EVALUATION RESULTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumLabel {
    Strong,
    Weak,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Momentum {
    pub is_strong: bool,
    pub label: MomentumLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    Oversold,
    Overbought,
    Neutral,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Oversold => write!(f, "Oversold"),
            Zone::Overbought => write!(f, "Overbought"),
            Zone::Neutral => write!(f, "Neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneCheck {
    pub pass: bool,
    pub zone: Zone,
    pub saw_new_swing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Long,
    Short,
}

impl SignalDirection {
    pub fn trend(&self) -> Trend {
        match self {
            SignalDirection::Long => Trend::UpTrend,
            SignalDirection::Short => Trend::DownTrend,
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Long => write!(f, "Long"),
            SignalDirection::Short => write!(f, "Short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::VeryLow => write!(f, "Very Low"),
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitTargets {
    pub target1: Decimal,
    pub target2: Decimal,
    pub target3: Decimal,
}

// =============================================================================
// SIGNAL CONTRACT
// =============================================================================

/// Everything a dispatched signal reports about the market at send time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub signal_id: String,
    pub market: String,
    pub direction: SignalDirection,
    pub risk: RiskLevel,
    pub trend_coarse: Trend,
    pub trend_fine: Trend,
    pub trend_fast: Trend,
    pub momentum_strong: bool,
    pub hpta_aligned: bool,
    pub zone: Zone,
    pub stop_loss: Decimal,
    pub targets: ProfitTargets,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    /// HTML body for the notification channel
    pub fn to_message(&self) -> String {
        let check = |ok: bool| if ok { "✓" } else { "✗" };
        format!(
            "🔔 <b>{} signal for {}</b>\n\
             {} - {}\n\
             1H = {} ->\n\
             M15 = {} ->\n\
             M3 = {} ->\n\
             Momentum = {}\n\
             HPTA = {}\n\
             Zone: {}\n\
             Risk: {}\n\
             Stop Loss: {:.4}\n\
             Profit Target 1: {:.4}\n\
             Profit Target 2: {:.4}\n\
             Profit Target 3: {:.4}\n\
             Current price: ${:.4}\n\
             Time: {}",
            self.direction,
            self.market,
            self.timestamp.format("%H:%M:%S"),
            self.market,
            self.trend_coarse,
            self.trend_fine,
            self.trend_fast,
            check(self.momentum_strong),
            check(self.hpta_aligned),
            self.zone,
            self.risk,
            self.stop_loss,
            self.targets.target1,
            self.targets.target2,
            self.targets.target3,
            self.price,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SIGNAL [{}]: {} {} @ {} (Risk: {} - Zone: {})",
            &self.signal_id[..8.min(self.signal_id.len())],
            self.market,
            self.direction,
            self.price,
            self.risk,
            self.zone
        )
    }
}

// =============================================================================
// COINEX WIRE TYPES
// =============================================================================

/// Common response envelope of the CoinEx perpetual v1 API
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketInfo {
    pub name: String,
}

/// Kline rows arrive as `[time, open, close, high, low, volume, ...]`,
/// with numbers encoded either as JSON numbers or strings.
pub fn candle_from_row(row: &[serde_json::Value]) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    let secs = match &row[0] {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.parse().ok()?,
        _ => return None,
    };

    Some(Candle {
        open_time: Utc.timestamp_opt(secs, 0).single()?,
        open: decimal_from_value(&row[1])?,
        close: decimal_from_value(&row[2])?,
        high: decimal_from_value(&row[3])?,
        low: decimal_from_value(&row[4])?,
        volume: decimal_from_value(&row[5])?,
    })
}

pub fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => parse_decimal(s),
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

/// Plain notation first, then exponent form (`1.234e-5`)
fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_candle_from_string_row() {
        let row = json!([1700000000, "100.5", "101", "102.25", "99", "12.5", "0", "BTCUSDT"]);
        let candle = candle_from_row(row.as_array().unwrap()).unwrap();

        assert_eq!(candle.open_time.timestamp(), 1700000000);
        assert_eq!(candle.open, dec!(100.5));
        assert_eq!(candle.close, dec!(101));
        assert_eq!(candle.high, dec!(102.25));
        assert_eq!(candle.low, dec!(99));
        assert_eq!(candle.volume, dec!(12.5));
    }

    #[test]
    fn test_small_prices_in_exponent_form() {
        assert_eq!(decimal_from_value(&json!(1.234e-5)), Some(dec!(0.00001234)));
        assert_eq!(decimal_from_value(&json!("2.5e-7")), Some(dec!(0.00000025)));
        assert_eq!(decimal_from_value(&json!(0.5)), Some(dec!(0.5)));
        assert_eq!(decimal_from_value(&json!(null)), None);
    }

    #[test]
    fn test_candle_from_short_row_rejected() {
        let row = json!([1700000000, "1", "2"]);
        assert!(candle_from_row(row.as_array().unwrap()).is_none());
    }

    #[test]
    fn test_channel_diameter() {
        let t = Utc.timestamp_opt(0, 0).unwrap();
        let channel = Channel {
            support: (SwingPoint::new(t, dec!(90)), SwingPoint::new(t, dec!(100))),
            resistance: (SwingPoint::new(t, dec!(180)), SwingPoint::new(t, dec!(200))),
        };
        assert_eq!(channel.diameter(), dec!(100));
    }

    #[test]
    fn test_risk_display() {
        assert_eq!(RiskLevel::VeryLow.to_string(), "Very Low");
        assert_eq!(Trend::Sideways.to_string(), "sideway");
    }
}
