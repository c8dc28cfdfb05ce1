//! Reconnect backoff.
//!
//! A freshly formed group is not always routable the instant it is reported,
//! so the member retries its connect with exponentially growing pauses.

use std::time::Duration;

use crate::core::RetryPolicy;
use crate::core::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CONNECT_RETRIES, DEFAULT_INITIAL_BACKOFF,
    DEFAULT_MAX_BACKOFF,
};

/// Exponential backoff with a cap and a bounded number of retries.
///
/// With the defaults the pauses after failed attempts 1, 2 and 3 are
/// 200ms, 400ms and 800ms; attempt 4 is the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Pause after the first failed attempt.
    pub initial: Duration,
    /// Growth factor per retry.
    pub multiplier: u32,
    /// Upper bound for a single pause.
    pub max_delay: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: DEFAULT_MAX_BACKOFF,
            max_retries: DEFAULT_CONNECT_RETRIES,
        }
    }
}

impl ExponentialBackoff {
    /// Create a backoff policy.
    pub fn new(initial: Duration, multiplier: u32, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            multiplier,
            max_delay,
            max_retries,
        }
    }

    /// Same policy with a different retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Same policy with a different first pause.
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    /// Pause before retry number `retry` (1-based), ignoring the budget.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial.saturating_mul(factor).min(self.max_delay)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, failed_attempt: u32) -> Option<Duration> {
        (1..=self.max_retries)
            .contains(&failed_attempt)
            .then(|| self.delay_for(failed_attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(2), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(3), Some(Duration::from_millis(800)));
        assert_eq!(backoff.next_delay(4), None);
        assert_eq!(backoff.max_attempts(), 4);
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = ExponentialBackoff::new(
            Duration::from_secs(1),
            10,
            Duration::from_secs(30),
            u32::MAX,
        );
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(30));
        // No overflow for huge retry numbers.
        assert_eq!(backoff.delay_for(1000), Duration::from_secs(30));
    }

    #[test]
    fn test_no_retries() {
        let backoff = ExponentialBackoff::default().with_max_retries(0);
        assert_eq!(backoff.next_delay(1), None);
        assert_eq!(backoff.max_attempts(), 1);
    }
}
