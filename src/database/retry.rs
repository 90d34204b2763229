use std::time::Duration;

use derive_new::new;
use tokio_retry::strategy::FixedInterval;

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delays to wait before each retry. Yields one delay fewer than the number of attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let retries = self.max_attempts.max(1) - 1;
        FixedInterval::new(self.backoff).take(retries)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(250));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays, vec![Duration::from_millis(250); 2]);
    }

    #[test]
    fn single_attempt_never_waits() {
        assert_eq!(RetryPolicy::once().delays().count(), 0);
        assert_eq!(RetryPolicy::new(0, Duration::from_secs(1)).delays().count(), 0);
    }
}
