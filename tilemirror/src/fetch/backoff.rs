//! Exponential backoff for tile download retries.

use std::time::Duration;

/// Delay after the first failed attempt (1 second).
pub const DEFAULT_INITIAL_DELAY_SECS: u64 = 1;

/// Delay cap (one hour).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 60 * 60;

/// Multiplier applied after each failure.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Capped exponential backoff with no attempt limit.
///
/// Tile downloads never give up; the backoff only spaces the attempts out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(DEFAULT_INITIAL_DELAY_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl Backoff {
    /// Delay to wait after the `failures`-th consecutive failure (1-based).
    ///
    /// `initial_delay * multiplier^(failures-1)`, capped at `max_delay`.
    pub fn delay_for_failure(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}
