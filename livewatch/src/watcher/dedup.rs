//! TTL-based stream deduplication.
//!
//! Remembers which streams have already been notified so a popular stream
//! alerts at most once per expiry window. Memory-only; never
//! authoritative state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use platforms_api::UniqueStreamKey;

use crate::clock::Clock;

/// Fixed expiry for dedup entries (1 hour).
const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(60 * 60);

/// Minimum size before a full pruning pass is worth an O(n) scan.
const PRUNE_MIN_SIZE: usize = 256;

/// Expiring set of stream keys.
///
/// Entries expire a fixed TTL after insertion. Expiry is lazy (checked on
/// read) with an opportunistic full prune once the map grows, so the
/// cache stays bounded without a sweeper task. The clock is injected so
/// expiry is deterministic in tests.
pub struct ExpiringKeyCache {
    entries: DashMap<UniqueStreamKey, DateTime<Utc>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl ExpiringKeyCache {
    /// Create a cache with the default 1-hour TTL.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(DEFAULT_ENTRY_TTL, clock)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(1)),
            clock,
        }
    }

    /// Remember a key from now until its TTL elapses.
    pub fn insert(&self, key: UniqueStreamKey) {
        let now = self.clock.now();
        self.entries.insert(key, now);
        if self.entries.len() >= PRUNE_MIN_SIZE {
            self.prune();
        }
    }

    /// Whether the key was inserted within the TTL window.
    pub fn contains(&self, key: &UniqueStreamKey) -> bool {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) => {
                if now - *entry < self.ttl {
                    true
                } else {
                    drop(entry);
                    self.entries.remove(key);
                    false
                }
            }
            None => false,
        }
    }

    /// Drop all entries, expired or not.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries.
    pub fn prune(&self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries.retain(|_, inserted| now - *inserted < ttl);
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn key(id: &str) -> UniqueStreamKey {
        UniqueStreamKey::new("twitchtv", id)
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = ExpiringKeyCache::new(clock.clone());

        cache.insert(key("shroud"));
        assert!(cache.contains(&key("shroud")));

        // Still deduplicated one minute before expiry.
        clock.advance(chrono::Duration::minutes(59));
        assert!(cache.contains(&key("shroud")));

        // Eligible again one minute after expiry.
        clock.advance(chrono::Duration::minutes(2));
        assert!(!cache.contains(&key("shroud")));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = ExpiringKeyCache::new(clock);

        cache.insert(key("Shroud"));
        assert!(cache.contains(&key("shroud")));
    }

    #[test]
    fn test_clear() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = ExpiringKeyCache::new(clock);

        cache.insert(key("a"));
        cache.insert(key("b"));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prune_drops_only_expired() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = ExpiringKeyCache::new(clock.clone());

        cache.insert(key("old"));
        clock.advance(chrono::Duration::minutes(45));
        cache.insert(key("new"));
        clock.advance(chrono::Duration::minutes(30));

        cache.prune();
        assert!(!cache.contains(&key("old")));
        assert!(cache.contains(&key("new")));
    }
}
