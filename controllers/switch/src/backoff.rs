//! # Fibonacci Backoff
//!
//! Progressive requeue delays for failed reconciliations. Grows more slowly
//! than exponential backoff so a switch waiting on a transient store failure is
//! retried promptly, while a persistently failing one settles at the cap.
//!
//! Sequence (minutes): 1, 1, 2, 3, 5, 8, 10 (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Calculations are performed in minutes and converted to a `Duration` when
/// handed to the controller runtime.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in minutes (for reset)
    min_minutes: u64,
    /// Previous backoff value in minutes
    prev_minutes: u64,
    /// Current backoff value in minutes
    current_minutes: u64,
    /// Maximum backoff value in minutes
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff bounded by `min_minutes` and `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Next delay, advancing the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);

        delay
    }

    /// Back to the first step
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Per-resource backoff bookkeeping
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    /// Consecutive failed reconciliations
    pub error_count: u32,
}

impl BackoffState {
    /// Record a failure and return the delay before the next attempt
    pub fn record_error(&mut self) -> Duration {
        self.error_count += 1;
        self.backoff.next_backoff()
    }

    /// Forget previous failures
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(backoff: &mut FibonacciBackoff, n: usize) -> Vec<u64> {
        (0..n).map(|_| backoff.next_backoff().as_secs() / 60).collect()
    }

    #[test]
    fn test_fibonacci_backoff_sequence_caps_at_max() {
        let mut backoff = FibonacciBackoff::new(1, 10);
        assert_eq!(minutes(&mut backoff, 9), vec![1, 1, 2, 3, 5, 8, 10, 10, 10]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::default();
        assert_eq!(minutes(&mut backoff, 4), vec![1, 1, 2, 3]);

        backoff.reset();
        assert_eq!(minutes(&mut backoff, 3), vec![1, 1, 2]);
    }

    #[test]
    fn test_backoff_state_counts_errors() {
        let mut state = BackoffState::default();
        assert_eq!(state.record_error(), Duration::from_secs(60));
        assert_eq!(state.record_error(), Duration::from_secs(60));
        assert_eq!(state.record_error(), Duration::from_secs(120));
        assert_eq!(state.error_count, 3);

        state.reset();
        assert_eq!(state.error_count, 0);
        assert_eq!(state.record_error(), Duration::from_secs(60));
    }
}
