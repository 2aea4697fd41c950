//! Result cache keyed by request fingerprint.
//!
//! Entries are never evicted on access. The scheduler calls
//! [`ResultCache::evict_older_than`] on its own cadence, so an entry can outlive
//! its max age by up to one eviction interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use collage_job_queue::{ArtifactRef, Fingerprint};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A cached artifact and the moment it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub artifact: ArtifactRef,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time cache counts for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub entry_count: usize,
}

/// Concurrent fingerprint -> artifact map. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: Arc<DashMap<Fingerprint, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<ArtifactRef> {
        self.entries
            .get(fingerprint)
            .map(|entry| entry.artifact.clone())
    }

    /// Store an artifact, replacing any previous entry with a fresh timestamp.
    pub fn put(&self, fingerprint: Fingerprint, artifact: ArtifactRef) {
        self.put_at(fingerprint, artifact, Utc::now());
    }

    /// Store an artifact with an explicit creation time.
    pub fn put_at(&self, fingerprint: Fingerprint, artifact: ArtifactRef, created_at: DateTime<Utc>) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                artifact,
                created_at,
            },
        );
    }

    /// Remove every entry created at or before `now - max_age`. Returns the number removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        self.evict_older_than_at(max_age, Utc::now())
    }

    /// Same as [`evict_older_than`](Self::evict_older_than) against an explicit clock reading.
    pub fn evict_older_than_at(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return 0;
        };

        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            let fresh = entry.created_at > cutoff;
            if !fresh {
                evicted += 1;
            }
            fresh
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "evicted stale cache entries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entry_count: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from(s)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResultCache::new();
        cache.put(fp("abc"), ArtifactRef::new("out/abc.png", 42));
        assert_eq!(cache.get(&fp("abc")), Some(ArtifactRef::new("out/abc.png", 42)));
        assert_eq!(cache.get(&fp("missing")), None);
    }

    #[test]
    fn evicting_with_zero_age_clears_everything() {
        let cache = ResultCache::new();
        cache.put(fp("abc"), ArtifactRef::new("out/abc.png", 42));
        assert_eq!(cache.evict_older_than(Duration::ZERO), 1);
        assert_eq!(cache.get(&fp("abc")), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn put_overwrites_with_fresh_timestamp() {
        let cache = ResultCache::new();
        let t0 = Utc::now() - chrono::Duration::hours(2);
        cache.put_at(fp("abc"), ArtifactRef::new("old.png", 1), t0);
        cache.put(fp("abc"), ArtifactRef::new("new.png", 2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evict_older_than(Duration::from_secs(3600)), 0);
        assert_eq!(cache.get(&fp("abc")).unwrap().location, "new.png");
    }

    #[test]
    fn eviction_respects_max_age_boundary() {
        let hour = Duration::from_secs(3600);
        let t = Utc::now();

        let cache = ResultCache::new();
        cache.put_at(fp("abc"), ArtifactRef::new("a.png", 1), t);

        let at_59 = t + chrono::Duration::minutes(59);
        assert_eq!(cache.evict_older_than_at(hour, at_59), 0);
        assert!(cache.get(&fp("abc")).is_some());

        let at_61 = t + chrono::Duration::minutes(61);
        assert_eq!(cache.evict_older_than_at(hour, at_61), 1);
        assert!(cache.get(&fp("abc")).is_none());
    }

    #[test]
    fn eviction_only_touches_stale_entries() {
        let cache = ResultCache::new();
        let now = Utc::now();
        cache.put_at(fp("old"), ArtifactRef::new("old.png", 1), now - chrono::Duration::minutes(90));
        cache.put_at(fp("new"), ArtifactRef::new("new.png", 1), now - chrono::Duration::minutes(5));

        assert_eq!(cache.evict_older_than_at(Duration::from_secs(3600), now), 1);
        assert_eq!(cache.snapshot(), CacheSnapshot { entry_count: 1 });
        assert!(cache.get(&fp("new")).is_some());
    }

    #[test]
    fn eviction_count_ignores_concurrent_inserts() {
        let cache = ResultCache::new();
        let now = Utc::now();
        let stale_at = now - chrono::Duration::hours(2);
        for n in 0..100 {
            cache.put_at(fp(&format!("stale-{n}")), ArtifactRef::new("old.png", 1), stale_at);
        }

        let writer = cache.clone();
        let evicted = std::thread::scope(|scope| {
            scope.spawn(move || {
                for n in 0..1000 {
                    writer.put_at(fp(&format!("fresh-{n}")), ArtifactRef::new("new.png", 1), now);
                }
            });
            cache.evict_older_than_at(Duration::from_secs(3600), now)
        });

        assert_eq!(evicted, 100);
        assert_eq!(cache.len(), 1000);
    }

    #[test]
    fn clones_share_entries() {
        let cache = ResultCache::new();
        let other = cache.clone();
        other.put(fp("abc"), ArtifactRef::new("a.png", 1));
        assert!(cache.get(&fp("abc")).is_some());
    }
}
