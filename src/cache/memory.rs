//! In-process membership cache
//!
//! Thread-safe map with a TTL per entry. Expired entries are dropped when
//! they are read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::MembershipCache;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn fresh(value: String, ttl: Duration) -> Self {
        Slot {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

/// Entry counts at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    /// Expired but not evicted yet
    pub expired: usize,
}

/// Shared in-memory store backing both the TTL cache and the etag records
///
/// Clones share the same storage, so one instance can be handed to every
/// concurrent organization pass.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict `key` if it has expired; a concurrent refresh wins
    async fn evict_stale(&self, key: &str) {
        let mut slots = self.slots.write().await;
        if slots.get(key).is_some_and(Slot::expired) {
            slots.remove(key);
        }
    }

    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let slots = self.slots.read().await;
        CacheStats {
            entries: slots.len(),
            expired: slots.values().filter(|slot| slot.expired()).count(),
        }
    }
}

#[async_trait]
impl MembershipCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let slots = self.slots.read().await;
            match slots.get(key) {
                None => return None,
                Some(slot) if !slot.expired() => return Some(slot.value.clone()),
                Some(_) => {}
            }
        }
        self.evict_stale(key).await;
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.slots
            .write()
            .await
            .insert(key.to_string(), Slot::fresh(value, ttl));
    }

    async fn touch(&self, key: &str, ttl: Duration) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get_mut(key) {
            Some(slot) if !slot.expired() => {
                slot.expires_at = Instant::now() + ttl;
                true
            }
            _ => false,
        }
    }

    async fn invalidate(&self, key: &str) -> bool {
        self.slots.write().await.remove(key).is_some()
    }
}
