// ============================================================================
// SAFE MODE: repeated fetch failures take a market out of rotation
// ============================================================================

use tracing::{error, warn};

use crate::state::MarketState;

pub const DEFAULT_MAX_ERRORS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    Retry { error_count: u32 },
    Disable { error_count: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct SafeMode {
    /// Consecutive primary fetch failures before the market is dropped
    max_errors_before_disable: u32,
}

impl Default for SafeMode {
    fn default() -> Self {
        Self {
            max_errors_before_disable: DEFAULT_MAX_ERRORS,
        }
    }
}

impl SafeMode {
    pub fn with_config(max_errors: u32) -> Self {
        Self {
            max_errors_before_disable: max_errors.max(1),
        }
    }

    pub fn record_failure(&self, state: &mut MarketState) -> FailureVerdict {
        state.error_count += 1;
        let error_count = state.error_count;

        if error_count >= self.max_errors_before_disable {
            error!(
                "{} removed from the active list after {} consecutive fetch errors",
                state.market, error_count
            );
            FailureVerdict::Disable { error_count }
        } else {
            warn!(
                "M15 data for {} not received. Error number {}.",
                state.market, error_count
            );
            FailureVerdict::Retry { error_count }
        }
    }

    pub fn record_success(&self, state: &mut MarketState) {
        state.error_count = 0;
    }
}
