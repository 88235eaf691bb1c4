use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::{Resolution, SwingSet};

/// Everything the monitor remembers about one market between cycles
#[derive(Debug, Clone)]
pub struct MarketState {
    pub market: String,
    pub swings: HashMap<Resolution, SwingSet>,
    pub error_count: u32,
    pub last_signal_time: Option<DateTime<Utc>>,
}

impl MarketState {
    pub fn new(market: String) -> Self {
        Self {
            market,
            swings: HashMap::new(),
            error_count: 0,
            last_signal_time: None,
        }
    }

    pub fn swings(&self, resolution: Resolution) -> Option<&SwingSet> {
        self.swings.get(&resolution)
    }

    pub fn store_swings(&mut self, resolution: Resolution, swings: SwingSet) {
        self.swings.insert(resolution, swings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_market_state_is_empty() {
        let state = MarketState::new("BTCUSDT".to_string());
        assert_eq!(state.error_count, 0);
        assert!(state.last_signal_time.is_none());
        assert!(state.swings(Resolution::Fine).is_none());
    }

    #[test]
    fn test_swings_are_kept_per_resolution() {
        let mut state = MarketState::new("BTCUSDT".to_string());
        state.store_swings(Resolution::Fast, SwingSet::default());
        assert!(state.swings(Resolution::Fast).is_some());
        assert!(state.swings(Resolution::Coarse).is_none());
    }
}
