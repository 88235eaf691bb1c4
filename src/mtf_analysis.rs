// =============================================================================
// MULTI-TIMEFRAME ALIGNMENT (HPTA)
// Fine/fast trend agreement and coarse-trend risk grading
// =============================================================================

use tracing::{debug, info};

use crate::types::{RiskLevel, SignalDirection, Trend};

#[derive(Debug, Clone, Copy, Default)]
pub struct MtfAnalyzer;

impl MtfAnalyzer {
    pub fn new() -> Self {
        Self {}
    }

    /// Both resolutions trend the same way. Sideways never aligns.
    pub fn hpta_aligned(&self, market: &str, trend_fine: Trend, trend_fast: Trend) -> bool {
        let aligned = matches!(
            (trend_fine, trend_fast),
            (Trend::UpTrend, Trend::UpTrend) | (Trend::DownTrend, Trend::DownTrend)
        );
        debug!(
            "HPTA checked for {}: M15={}, M3={}, Result={}",
            market, trend_fine, trend_fast, aligned
        );
        if !aligned {
            info!("{}: Stuck at HPTA", market);
        }
        aligned
    }

    pub fn direction(&self, trend_fine: Trend, trend_fast: Trend) -> Option<SignalDirection> {
        match (trend_fine, trend_fast) {
            (Trend::UpTrend, Trend::UpTrend) => Some(SignalDirection::Long),
            (Trend::DownTrend, Trend::DownTrend) => Some(SignalDirection::Short),
            _ => None,
        }
    }

    /// Coarse trend agreeing with the signal is the safest case, a sideways
    /// coarse trend is next, a coarse trend against the signal is riskiest.
    pub fn risk(&self, direction: SignalDirection, trend_coarse: Trend) -> RiskLevel {
        if trend_coarse == direction.trend() {
            RiskLevel::VeryLow
        } else if trend_coarse == Trend::Sideways {
            RiskLevel::Low
        } else {
            RiskLevel::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hpta_requires_matching_direction() {
        let mtf = MtfAnalyzer::new();
        assert!(mtf.hpta_aligned("BTCUSDT", Trend::UpTrend, Trend::UpTrend));
        assert!(mtf.hpta_aligned("BTCUSDT", Trend::DownTrend, Trend::DownTrend));
        assert!(!mtf.hpta_aligned("BTCUSDT", Trend::UpTrend, Trend::DownTrend));
        assert!(!mtf.hpta_aligned("BTCUSDT", Trend::Sideways, Trend::Sideways));
        assert!(!mtf.hpta_aligned("BTCUSDT", Trend::DownTrend, Trend::Sideways));
    }

    #[test]
    fn test_direction() {
        let mtf = MtfAnalyzer::new();
        assert_eq!(mtf.direction(Trend::UpTrend, Trend::UpTrend), Some(SignalDirection::Long));
        assert_eq!(mtf.direction(Trend::DownTrend, Trend::DownTrend), Some(SignalDirection::Short));
        assert_eq!(mtf.direction(Trend::UpTrend, Trend::Sideways), None);
    }

    #[test]
    fn test_risk_grading() {
        let mtf = MtfAnalyzer::new();
        assert_eq!(mtf.risk(SignalDirection::Long, Trend::UpTrend), RiskLevel::VeryLow);
        assert_eq!(mtf.risk(SignalDirection::Long, Trend::Sideways), RiskLevel::Low);
        assert_eq!(mtf.risk(SignalDirection::Long, Trend::DownTrend), RiskLevel::Medium);
        assert_eq!(mtf.risk(SignalDirection::Short, Trend::DownTrend), RiskLevel::VeryLow);
        assert_eq!(mtf.risk(SignalDirection::Short, Trend::UpTrend), RiskLevel::Medium);
    }
}
