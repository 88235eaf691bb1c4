// ============================================================
// Signal cooldown: minimum spacing between dispatched signals
// ============================================================

use chrono::{DateTime, Duration, Utc};

use crate::state::MarketState;

pub const DEFAULT_SIGNAL_INTERVAL_SECS: i64 = 180;

#[derive(Debug, Clone, Copy)]
pub struct CooldownManager {
    min_interval: Duration,
}

impl CooldownManager {
    pub fn new() -> Self {
        Self::with_interval_secs(DEFAULT_SIGNAL_INTERVAL_SECS)
    }

    pub fn with_interval_secs(secs: i64) -> Self {
        Self {
            min_interval: Duration::seconds(secs.max(0)),
        }
    }

    /// Seconds left before this market may signal again, zero when it may
    pub fn remaining(&self, state: &MarketState, now: DateTime<Utc>) -> i64 {
        match state.last_signal_time {
            Some(last) => {
                let elapsed = now.signed_duration_since(last);
                (self.min_interval - elapsed).num_seconds().max(0)
            }
            None => 0,
        }
    }

    pub fn is_on_cooldown(&self, state: &MarketState, now: DateTime<Utc>) -> bool {
        match state.last_signal_time {
            Some(last) => now.signed_duration_since(last) < self.min_interval,
            None => false,
        }
    }

    /// Call only after the notification went out
    pub fn record_signal(&self, state: &mut MarketState, now: DateTime<Utc>) {
        state.last_signal_time = Some(now);
    }
}

impl Default for CooldownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cooldown_window() {
        let cooldown = CooldownManager::new();
        let mut state = MarketState::new("BTCUSDT".to_string());
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert!(!cooldown.is_on_cooldown(&state, t0));
        cooldown.record_signal(&mut state, t0);

        assert!(cooldown.is_on_cooldown(&state, t0 + Duration::seconds(179)));
        assert_eq!(cooldown.remaining(&state, t0 + Duration::seconds(179)), 1);
        assert!(!cooldown.is_on_cooldown(&state, t0 + Duration::seconds(180)));
        assert_eq!(cooldown.remaining(&state, t0 + Duration::seconds(180)), 0);
    }
}
