use std::collections::VecDeque;

/// Number of samples kept for the rolling average.
pub const LATENCY_WINDOW: usize = 100;

/// One timed message: when the sender stamped it and when it was received.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    /// Sender timestamp in Unix milliseconds
    pub sent_ms: i64,
    /// Receive time in Unix milliseconds
    pub received_ms: i64,
}

impl LatencySample {
    #[must_use]
    pub const fn new(sent_ms: i64, received_ms: i64) -> Self {
        Self {
            sent_ms,
            received_ms,
        }
    }

    #[must_use]
    pub const fn latency_ms(&self) -> i64 {
        self.received_ms.saturating_sub(self.sent_ms)
    }
}

/// Rolling window of the most recent latency samples.
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: VecDeque<LatencySample>,
}

impl LatencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: LatencySample) {
        if self.samples.len() >= LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Mean latency over the retained window in milliseconds, `0.0` when empty.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "Averages are reported as fractional milliseconds"
    )]
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: i64 = self
            .samples
            .iter()
            .map(LatencySample::latency_ms)
            .fold(0_i64, i64::saturating_add);
        total as f64 / self.samples.len() as f64
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_reports_zero() {
        let tracker = LatencyTracker::new();
        assert!(tracker.average_ms().abs() < f64::EPSILON);
    }

    #[test]
    fn averages_over_samples() {
        let mut tracker = LatencyTracker::new();
        tracker.record(LatencySample::new(1_000, 1_010));
        tracker.record(LatencySample::new(2_000, 2_030));

        assert!((tracker.average_ms() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_keeps_most_recent_hundred() {
        let mut tracker = LatencyTracker::new();
        // First 50 samples have 1000ms latency, the last 100 have 10ms.
        for i in 0..50 {
            tracker.record(LatencySample::new(i, i + 1_000));
        }
        for i in 0..100 {
            tracker.record(LatencySample::new(i, i + 10));
        }

        assert_eq!(tracker.len(), LATENCY_WINDOW);
        assert!((tracker.average_ms() - 10.0).abs() < f64::EPSILON);
    }
}
