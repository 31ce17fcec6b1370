//! Retry policy: decides backoff delays between passes of the same work.

use std::time::Duration;

/// Exponential backoff between attempts of one named work.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 30s から倍々で増やし、5 時間で頭打ち。
    pub fn standard() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5 * 60 * 60),
        }
    }

    /// Calculate delay for the next retry based on attempt number.
    ///
    /// `attempts` is the number of attempts already made (1-indexed).
    /// delay = base_delay * multiplier^(attempts - 1), capped at `max_delay`.
    ///
    /// Example with base_delay=30s, multiplier=2.0:
    /// - attempt 1 (first failure): 30s
    /// - attempt 2: 60s
    /// - attempt 3: 120s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn standard_policy_has_reasonable_values() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.base_delay, Duration::from_secs(30));
        assert_eq!(policy.multiplier, 2.0);
    }

    #[rstest]
    #[case(0, 30)]
    #[case(1, 30)]
    #[case(2, 60)]
    #[case(3, 120)]
    #[case(4, 240)]
    fn exponential_backoff_increases(#[case] attempts: u32, #[case] secs: u64) {
        assert_eq!(
            RetryPolicy::standard().next_delay(attempts),
            Duration::from_secs(secs)
        );
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.next_delay(40), policy.max_delay);
        assert_eq!(policy.next_delay(u32::MAX), policy.max_delay);
    }
}
