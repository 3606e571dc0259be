//! Membership cache
//!
//! A small key/value store with per-entry TTL that shields the rate-limited
//! platform API from redundant reads. Two call patterns sit on top of it:
//!
//! - read-through caching of derived facts via [`get_or_compute`], with an
//!   asymmetric [`TtlPolicy`] (positive answers live far longer than
//!   negative ones);
//! - etag records for team member lists, handled by
//!   [`CachingTeamApi`](crate::platforms::CachingTeamApi).
//!
//! Values are stored as JSON strings so one store can hold every flavor.

mod memory;

pub use memory::{CacheStats, MemoryCache};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Key/value store with TTL shared by every concurrent sync pass
#[async_trait]
pub trait MembershipCache: Send + Sync {
    /// Get a value if present and not expired
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// Extend the lifetime of an existing entry. Returns false when the key
    /// is absent or already expired.
    async fn touch(&self, key: &str, ttl: Duration) -> bool;

    /// Remove a key. Returns true if an entry was removed.
    async fn invalidate(&self, key: &str) -> bool;
}

/// Lifetime of cached facts, split by outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub positive: Duration,
    pub negative: Duration,
}

impl TtlPolicy {
    pub const fn new(positive: Duration, negative: Duration) -> Self {
        TtlPolicy { positive, negative }
    }

    pub fn ttl_for(&self, positive: bool) -> Duration {
        if positive {
            self.positive
        } else {
            self.negative
        }
    }
}

const MINUTE: u64 = 60;
const DAY: u64 = 24 * 60 * MINUTE;

/// Named cache policies, one per cached platform operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicies {
    pub user_exists: TtlPolicy,
    pub org_member: TtlPolicy,
    /// Sliding lifetime of a team's etag record
    pub team_members: Duration,
}

impl Default for CachePolicies {
    fn default() -> Self {
        CachePolicies {
            user_exists: TtlPolicy::new(Duration::from_secs(7 * DAY), Duration::from_secs(10 * MINUTE)),
            org_member: TtlPolicy::new(Duration::from_secs(DAY), Duration::from_secs(10 * MINUTE)),
            team_members: Duration::from_secs(DAY),
        }
    }
}

/// Cache keys. Every key is scoped so that concurrent orgs never collide.
pub mod keys {
    pub fn user_exists(user: &str) -> String {
        format!("user-exists:{user}")
    }

    pub fn org_member(org: &str, user: &str) -> String {
        format!("org-member:{}:{user}", org.to_ascii_lowercase())
    }

    pub fn team_members(org: &str, team: &str) -> String {
        format!(
            "team-members:{}:{}",
            org.to_ascii_lowercase(),
            team.to_ascii_lowercase()
        )
    }
}

/// Read-through lookup.
///
/// On a hit the cached value is returned and `compute` is never called. On
/// a miss `compute` runs and its value is stored with the lifetime chosen
/// by `ttl`. Errors from `compute` are returned and not cached; an entry
/// that no longer decodes counts as a miss.
pub async fn get_or_compute<T, F, Fut>(
    cache: &dyn MembershipCache,
    key: &str,
    ttl: impl Fn(&T) -> Duration,
    compute: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(raw) = cache.get(key).await {
        match serde_json::from_str(&raw) {
            Ok(value) => return Ok(value),
            Err(e) => tracing::debug!(key, error = %e, "Discarding undecodable cache entry"),
        }
    }

    let value = compute().await?;
    let raw = serde_json::to_string(&value)?;
    cache.set(key, raw, ttl(&value)).await;
    Ok(value)
}
