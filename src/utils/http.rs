// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::SourceConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Bounded retry policy for rate-limited upstream calls.
///
/// The delay for the n-th consecutive 429 (n starting at 1) is
/// `base_delay * n²`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay multiplier
    pub base_delay: Duration,
    /// Consecutive rate-limited responses tolerated before giving up
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Build the policy from source settings.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            config.max_attempts,
        )
    }

    /// Delay before retrying after the given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = attempt.saturating_mul(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Fresh backoff state for one logical call.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 10)
    }
}

/// Per-call backoff state. Dropped when the call completes.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// Register another rate-limited response.
    ///
    /// Returns the delay to wait before retrying, or `None` once the
    /// retry ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.policy.delay_for_attempt(self.attempt))
    }

    /// Rate-limited responses seen so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_quadratically() {
        let policy = RetryPolicy::new(Duration::from_millis(500), 10);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4500));
    }

    #[test]
    fn test_backoff_strictly_increases_and_resets_per_call() {
        let policy = RetryPolicy::default();

        let mut first_call = policy.backoff();
        let delays: Vec<_> = (0..4).filter_map(|_| first_call.next_delay()).collect();
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(first_call.attempts(), 4);

        let mut next_call = policy.backoff();
        assert_eq!(next_call.next_delay(), Some(policy.base_delay));
    }

    #[test]
    fn test_backoff_ceiling() {
        let policy = RetryPolicy::new(Duration::from_millis(1), 2);
        let mut backoff = policy.backoff();
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 2);
    }
}
