//! Retry backoff policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a failed job waits before it becomes eligible again:
/// `base_delay * 2^prior_failures`.
///
/// Deterministic: two workers computing the delay for the same job agree.
/// Delays keep doubling until they saturate at `Duration::MAX`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(60))
    }
}

impl RetryPolicy {
    pub fn exponential(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    /// Delay after a failure, given how many failures preceded it.
    ///
    /// With the default policy: 0 → 60 s, 1 → 120 s, 2 → 240 s.
    pub fn delay_for(&self, prior_failures: u32) -> Duration {
        let Some(factor) = 1u32.checked_shl(prior_failures) else {
            return Duration::MAX;
        };
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    /// `delay_for` as a chrono duration, for scheduling arithmetic.
    pub fn chrono_delay_for(&self, prior_failures: u32) -> chrono::Duration {
        chrono::Duration::from_std(self.delay_for(prior_failures)).unwrap_or(chrono::Duration::MAX)
    }
}
