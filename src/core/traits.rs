//! Core traits.

use std::time::Duration;

/// Decides whether, and after how long, a failed connect is retried.
///
/// Attempts are numbered from 1. `next_delay(n)` is asked after attempt `n`
/// failed and returns the pause before attempt `n + 1`, or `None` to give up.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use p2p_session::core::RetryPolicy;
///
/// struct Fixed;
///
/// impl RetryPolicy for Fixed {
///     fn next_delay(&self, failed_attempt: u32) -> Option<Duration> {
///         (failed_attempt < 3).then(|| Duration::from_millis(50))
///     }
/// }
///
/// assert_eq!(Fixed.max_attempts(), 3);
/// ```
pub trait RetryPolicy: Send + Sync + 'static {
    /// Pause before the next attempt, or `None` when attempts are exhausted.
    fn next_delay(&self, failed_attempt: u32) -> Option<Duration>;

    /// Total number of attempts this policy allows (first attempt included).
    ///
    /// Only meaningful for bounded policies.
    fn max_attempts(&self) -> u32 {
        let mut attempt = 1;
        while self.next_delay(attempt).is_some() {
            attempt += 1;
        }
        attempt
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _failed_attempt: u32) -> Option<Duration> {
        None
    }
}
