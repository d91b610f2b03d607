//! Reconnection delay policy.
//!
//! The delay for retry `n` (1-based) is
//! `min(initial * multiplier^(n - 1) + jitter, max_backoff)` where `jitter` is drawn
//! uniformly from `0..=max_jitter`. The policy also owns the attempt counter and
//! stops yielding delays once `max_attempts` retries have been scheduled.

use std::time::Duration;

use backoff::backoff::Backoff;
use rand::Rng as _;

use super::config::ReconnectConfig;

/// Exponential backoff with additive jitter and a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl ReconnectBackoff {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of retries scheduled since the last reset.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Whether every allowed retry has been used.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Delay before retry `attempt`, without jitter.
    ///
    /// Non-decreasing in `attempt` for multipliers of at least `1.0`, and never above
    /// `max_backoff`.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "Exponential growth is computed in floating point before capping"
    )]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.config.initial_backoff.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);
        let max = self.config.max_backoff;

        if secs.is_finite() && secs >= 0.0 && secs < max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            max
        }
    }

    /// Delay before retry `attempt`, jitter included.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let max_jitter = u64::try_from(self.config.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=max_jitter));

        self.base_delay(attempt)
            .saturating_add(jitter)
            .min(self.config.max_backoff)
    }
}

impl From<ReconnectConfig> for ReconnectBackoff {
    fn from(config: ReconnectConfig) -> Self {
        Self::new(config)
    }
}

impl Backoff for ReconnectBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt = self.attempt.saturating_add(1);
        Some(self.delay(self.attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectConfig {
        ReconnectConfig::builder()
            .initial_backoff(Duration::from_millis(1000))
            .max_attempts(10)
            .build()
    }

    #[test]
    fn base_delay_is_monotonic_and_capped() {
        let backoff = ReconnectBackoff::new(config());

        let mut previous = Duration::ZERO;
        for attempt in 1..=50 {
            let delay = backoff.base_delay(attempt);
            assert!(delay >= previous, "attempt {attempt} decreased");
            assert!(delay <= Duration::from_secs(30), "attempt {attempt} exceeds cap");
            previous = delay;
        }
        assert_eq!(backoff.base_delay(50), Duration::from_secs(30));
    }

    #[test]
    fn base_delay_grows_by_multiplier() {
        let backoff = ReconnectBackoff::new(config());

        assert_eq!(backoff.base_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(1500));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(2250));
    }

    #[test]
    fn first_delay_within_jitter_window() {
        let mut backoff = ReconnectBackoff::new(config());

        let first = backoff.next_backoff().unwrap();
        assert!(first >= Duration::from_millis(1000));
        assert!(first <= Duration::from_millis(2500));
        assert_eq!(backoff.attempt(), 1);
    }

    #[test]
    fn jittered_delay_never_exceeds_cap() {
        let backoff = ReconnectBackoff::new(config());

        for _ in 0..100 {
            assert!(backoff.delay(30) <= Duration::from_secs(30));
        }
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut backoff = ReconnectBackoff::new(
            ReconnectConfig::builder()
                .max_attempts(3)
                .max_jitter(Duration::ZERO)
                .build(),
        );

        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.is_exhausted());
        assert!(backoff.next_backoff().is_none());
        assert_eq!(backoff.attempt(), 3);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
    }
}
