//! Declarative retry policy attached to a job kind

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 means run once
    pub max_retries: u32,
    /// Exponent base: the n-th retry waits `base^n` units
    pub base: u64,
    /// Length of one delay unit (one second in production)
    pub unit: Duration,
    pub max_delay: Duration,
    /// Add random jitter to each delay (±30%)
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base: 2,
            unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Run exactly once
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_retries(max_retries: u32, base: u64, jitter: bool) -> Self {
        Self {
            max_retries,
            base,
            jitter,
            ..Self::default()
        }
    }

    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.base.max(1).saturating_pow(retry);
        let millis = (self.unit.as_millis() as u64).saturating_mul(factor);
        let delay = Duration::from_millis(millis).min(self.max_delay);

        if self.jitter {
            let jitter_factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
            Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
        } else {
            delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_base_to_the_attempt() {
        let policy = RetryPolicy::with_retries(3, 2, false);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_delay_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::with_retries(10, 2, false)
        };
        assert_eq!(policy.delay_for(8), Duration::from_secs(10));
        assert_eq!(policy.delay_for(64), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_thirty_percent() {
        let policy = RetryPolicy::with_retries(3, 2, true);
        for _ in 0..100 {
            let delay = policy.delay_for(2).as_millis();
            assert!((2800..=5200).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_none_runs_once() {
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }
}
