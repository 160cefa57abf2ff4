//! Backoff policy: decides poll intervals.

use std::time::Duration;

/// Exponential backoff with a cap.
///
/// interval(n) = min(initial * multiplier^(n - 1), max_interval), 1-indexed.
///
/// Example with initial=2s, multiplier=2.0, max=10s:
/// - attempt 1: 2s
/// - attempt 2: 4s
/// - attempt 3: 8s
/// - attempt 4: 10s
/// - attempt 5: 10s
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max_interval: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_interval,
        }
    }

    /// Interval to sleep after the `attempt`-th read (1-indexed).
    pub fn interval(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs)
    }

    /// The interval sequence, starting at attempt 1.
    pub fn intervals(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..).map(|attempt| self.interval(attempt))
    }
}
