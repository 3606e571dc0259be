//! Backoff policy shared by the HTTP adapters

use std::time::Duration;

/// Retry policy for rate-limited and transiently failing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first request
    pub max_retries: u32,
    /// Delay of the first backoff step
    pub base_delay: Duration,
    /// Upper bound for any single wait, server-advised or computed
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Short delays for tests
    pub fn for_testing() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        }
    }

    /// Exponential backoff for the given zero-based attempt, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Server-advised delay if present, backoff otherwise; always capped
    pub fn delay_for(&self, attempt: u32, advised: Option<Duration>) -> Duration {
        advised.unwrap_or_else(|| self.backoff(attempt)).min(self.max_delay)
    }
}

/// Parses a `Retry-After` header value. Only the delta-seconds form is
/// supported; HTTP dates fall back to computed backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
