//! GitHub rate limit detection
//!
//! GitHub signals two kinds of limits. The primary limit answers 429, or
//! 403 with `x-ratelimit-remaining: 0`, and says when it resets. The
//! secondary (abuse detection) limit answers 403 or 429 with a message
//! mentioning it, and sometimes a `retry-after`. Both are waited out.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

use crate::retry::parse_retry_after;

/// A response that asks the client to slow down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitSignal {
    /// Request quota exhausted; carries the advised wait when known
    Primary(Option<Duration>),
    /// Abuse detection triggered
    Secondary(Option<Duration>),
}

impl RateLimitSignal {
    pub fn advised_delay(&self) -> Option<Duration> {
        match self {
            RateLimitSignal::Primary(delay) | RateLimitSignal::Secondary(delay) => *delay,
        }
    }
}

/// Classify a 403/429 response. `now` is the current unix time, used to
/// turn `x-ratelimit-reset` into a delay.
pub fn classify(status: StatusCode, headers: &HeaderMap, body: &str, now: i64) -> Option<RateLimitSignal> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let retry_after = header("retry-after").and_then(parse_retry_after);

    if body.to_ascii_lowercase().contains("secondary rate limit") {
        return Some(RateLimitSignal::Secondary(retry_after));
    }

    let exhausted = header("x-ratelimit-remaining").map(str::trim) == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        let until_reset = header("x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|reset| Duration::from_secs(reset.saturating_sub(now).max(0) as u64));
        return Some(RateLimitSignal::Primary(retry_after.or(until_reset)));
    }

    if retry_after.is_some() {
        return Some(RateLimitSignal::Secondary(retry_after));
    }
    None
}
