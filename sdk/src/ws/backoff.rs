//! Reconnect backoff policy.

use std::time::Duration;

use super::config::{DEFAULT_RECONNECT_DELAY_MS, MAX_RECONNECT_DELAY_MS};

/// Bounded exponential backoff: `min(base * 2^attempt, cap)`.
///
/// The policy is stateless; the attempt counter belongs to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            Duration::from_millis(MAX_RECONNECT_DELAY_MS),
        )
    }
}

impl BackoffPolicy {
    /// Creates a policy with the given base delay and cap.
    #[must_use]
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Returns the base delay.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Returns the maximum delay.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Returns the delay before the reconnect that follows `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(0);
        if multiplier == 0 {
            return self.cap;
        }
        self.base
            .checked_mul(multiplier)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Returns [`delay`](Self::delay) in whole milliseconds.
    #[must_use]
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        u64::try_from(self.delay(attempt).as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_known_values() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_ms(0), 1_000);
        assert_eq!(policy.delay_ms(1), 2_000);
        assert_eq!(policy.delay_ms(2), 4_000);
        assert_eq!(policy.delay_ms(5), 32_000);
        assert_eq!(policy.delay_ms(6), 60_000);
        assert_eq!(policy.delay_ms(10), 60_000);
    }

    #[test]
    fn test_backoff_large_attempts_saturate() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_ms(31), 60_000);
        assert_eq!(policy.delay_ms(32), 60_000);
        assert_eq!(policy.delay_ms(u32::MAX), 60_000);
    }

    #[test]
    fn test_backoff_monotonic_and_bounded() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..200 {
            let delay = policy.delay(attempt);
            assert!(delay >= previous, "attempt {attempt} decreased");
            assert!(delay <= Duration::from_millis(60_000));
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_custom_base() {
        let policy = BackoffPolicy::new(Duration::from_millis(250), Duration::from_secs(1));
        assert_eq!(policy.delay(0), Duration::from_millis(250));
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(3), Duration::from_secs(1));
        assert_eq!(policy.base(), Duration::from_millis(250));
        assert_eq!(policy.cap(), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_delay_ms_saturates() {
        let policy = BackoffPolicy::new(Duration::MAX, Duration::MAX);
        assert_eq!(policy.delay(0), Duration::MAX);
        assert_eq!(policy.delay_ms(0), u64::MAX);
    }
}
