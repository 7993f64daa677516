// src/repositories/track_cache.rs
//
// Local Track Cache - time-bounded persistence of completed tracks
//
// CRITICAL RULES:
// - Only complete tracks are ever stored
// - Expired entries are purged lazily on read/list, never by a sweep
// - Store failures degrade to a no-op/empty result with a logged warning;
//   they never reach the caller and never corrupt in-memory state

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use crate::domain::{validate_track, CachedTrack, Track, TrackStatus};
use crate::repositories::kv_store::KeyValueStore;

/// Key namespace for cache entries in the backing store
const CACHE_NAMESPACE: &str = "track_cache:";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Bound on retained entries, most-recently-cached first
    pub max_entries: usize,

    /// Entry lifetime; entries older than this are invalid
    pub ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            ttl_hours: 24,
        }
    }
}

/// The Local Track Cache.
///
/// Persists completed tracks keyed by remote track id and keeps an in-memory
/// most-recent-first id list that drives retention. The list is hydrated from
/// the backing store at construction so the retention bound holds across
/// process restarts.
pub struct TrackCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    recent: Mutex<Vec<String>>,
}

impl TrackCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        let cache = Self {
            store,
            config,
            recent: Mutex::new(Vec::new()),
        };
        cache.hydrate_recent();
        cache
    }

    fn ttl(&self) -> Duration {
        Duration::hours(self.config.ttl_hours)
    }

    fn cache_key(track_id: &str) -> String {
        format!("{}{}", CACHE_NAMESPACE, track_id)
    }

    /// Rebuild the most-recent list from whatever the store already holds.
    fn hydrate_recent(&self) {
        let mut entries = match self.load_all_entries() {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("track cache: failed to hydrate recent list: {}", e);
                return;
            }
        };

        entries.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        let ids = entries.into_iter().map(|e| e.track.id).collect();
        *self.recent.lock().unwrap() = ids;
    }

    /// Store a completed track.
    ///
    /// Assigns a fresh surrogate id and `cached_at`, replaces any prior entry
    /// for the same remote id (moving it to the front of the retention list)
    /// and evicts the oldest entries beyond the configured bound.
    ///
    /// Returns `None` without storing anything when the track is not
    /// complete, violates the domain invariants, or the store write fails.
    pub fn put(&self, track: &Track) -> Option<CachedTrack> {
        if track.status != TrackStatus::Complete {
            log::warn!(
                "track cache: refusing to store track {} with status {}",
                track.id,
                track.status
            );
            return None;
        }

        if let Err(e) = validate_track(track) {
            log::warn!("track cache: refusing invalid track {}: {}", track.id, e);
            return None;
        }

        let entry = CachedTrack::new(track.clone());

        let encoded = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("track cache: failed to encode track {}: {}", track.id, e);
                return None;
            }
        };

        if let Err(e) = self.store.set(&Self::cache_key(&track.id), &encoded) {
            log::warn!("track cache: failed to store track {}: {}", track.id, e);
            return None;
        }

        // Re-put moves the id to the front; overflow evicts the oldest.
        let evicted: Vec<String> = {
            let mut recent = self.recent.lock().unwrap();
            recent.retain(|id| id != &track.id);
            recent.insert(0, track.id.clone());
            if recent.len() > self.config.max_entries {
                recent.split_off(self.config.max_entries)
            } else {
                Vec::new()
            }
        };

        if !evicted.is_empty() {
            let keys: Vec<String> = evicted.iter().map(|id| Self::cache_key(id)).collect();
            if let Err(e) = self.store.delete_many(&keys) {
                log::warn!("track cache: failed to evict {} entries: {}", keys.len(), e);
            }
        }

        Some(entry)
    }

    /// Fetch an unexpired entry by remote track id.
    ///
    /// An expired or corrupt entry is deleted and reported as a miss. Never
    /// calls the remote service.
    pub fn get(&self, track_id: &str) -> Option<CachedTrack> {
        let key = Self::cache_key(track_id);

        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("track cache: read failed for {}: {}", track_id, e);
                return None;
            }
        };

        let entry: CachedTrack = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                // Corrupt entries are treated as expired
                log::warn!("track cache: corrupt entry for {}: {}", track_id, e);
                self.purge(track_id, &key);
                return None;
            }
        };

        if entry.is_expired(Utc::now(), self.ttl()) {
            self.purge(track_id, &key);
            return None;
        }

        Some(entry)
    }

    /// Enumerate valid entries, newest-cached first, bounded by
    /// `max_entries`. Expired and corrupt entries encountered are purged.
    pub fn list(&self) -> Vec<CachedTrack> {
        let keys = match self.store.keys_with_prefix(CACHE_NAMESPACE) {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("track cache: list failed: {}", e);
                return Vec::new();
            }
        };

        let values = match self.store.get_many(&keys) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("track cache: list read failed: {}", e);
                return Vec::new();
            }
        };

        let now = Utc::now();
        let ttl = self.ttl();
        let mut valid: Vec<CachedTrack> = Vec::new();
        let mut stale_keys: Vec<String> = Vec::new();

        for (key, value) in keys.into_iter().zip(values) {
            let Some(raw) = value else { continue };
            match serde_json::from_str::<CachedTrack>(&raw) {
                Ok(entry) if !entry.is_expired(now, ttl) => valid.push(entry),
                Ok(_) => stale_keys.push(key),
                Err(e) => {
                    log::warn!("track cache: dropping corrupt entry {}: {}", key, e);
                    stale_keys.push(key);
                }
            }
        }

        if !stale_keys.is_empty() {
            if let Err(e) = self.store.delete_many(&stale_keys) {
                log::warn!("track cache: failed to purge {} entries: {}", stale_keys.len(), e);
            }
        }

        valid.sort_by(|a, b| b.cached_at.cmp(&a.cached_at));
        valid.truncate(self.config.max_entries);

        // Keep the retention list in sync with what actually survived
        *self.recent.lock().unwrap() = valid.iter().map(|e| e.track.id.clone()).collect();

        valid
    }

    /// Delete every entry under the cache namespace.
    pub fn clear(&self) {
        match self.store.keys_with_prefix(CACHE_NAMESPACE) {
            Ok(keys) => {
                if let Err(e) = self.store.delete_many(&keys) {
                    log::warn!("track cache: clear failed: {}", e);
                    return;
                }
                self.recent.lock().unwrap().clear();
            }
            Err(e) => log::warn!("track cache: clear enumeration failed: {}", e),
        }
    }

    fn purge(&self, track_id: &str, key: &str) {
        if let Err(e) = self.store.delete(key) {
            log::warn!("track cache: failed to purge {}: {}", track_id, e);
        }
        self.recent.lock().unwrap().retain(|id| id != track_id);
    }

    fn load_all_entries(&self) -> crate::error::AppResult<Vec<CachedTrack>> {
        let keys = self.store.keys_with_prefix(CACHE_NAMESPACE)?;
        let values = self.store.get_many(&keys)?;

        Ok(values
            .into_iter()
            .flatten()
            .filter_map(|raw| serde_json::from_str(&raw).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::repositories::kv_store::{InMemoryKeyValueStore, MockKeyValueStore};
    use chrono::Utc;

    fn complete_track(id: &str) -> Track {
        let mut track = Track::new(id.to_string(), format!("Track {}", id), "prompt".to_string());
        track.status = TrackStatus::Complete;
        track.audio_url = Some(format!("https://cdn.example/{}.mp3", id));
        track.duration_seconds = Some(120.0);
        track
    }

    fn cache_with_store(max_entries: usize) -> (Arc<InMemoryKeyValueStore>, TrackCache) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let cache = TrackCache::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            CacheConfig {
                max_entries,
                ttl_hours: 24,
            },
        );
        (store, cache)
    }

    /// Write an entry directly into the store with a chosen cached_at.
    fn seed_entry(store: &InMemoryKeyValueStore, id: &str, age_hours: i64) {
        let mut entry = CachedTrack::new(complete_track(id));
        entry.cached_at = Utc::now() - Duration::hours(age_hours);
        store
            .set(
                &format!("track_cache:{}", id),
                &serde_json::to_string(&entry).unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn put_and_get_roundtrip() {
        let (_store, cache) = cache_with_store(50);

        let cached = cache.put(&complete_track("t1")).unwrap();
        assert_ne!(cached.cache_id.to_string(), "t1");

        let fetched = cache.get("t1").unwrap();
        assert_eq!(fetched.track.id, "t1");
        assert_eq!(fetched.cache_id, cached.cache_id);
    }

    #[test]
    fn non_complete_track_is_never_stored() {
        let (store, cache) = cache_with_store(50);

        let mut track = complete_track("t1");
        track.status = TrackStatus::Error;
        track.audio_url = None;

        assert!(cache.put(&track).is_none());
        assert!(store.keys_with_prefix("track_cache:").unwrap().is_empty());
    }

    #[test]
    fn expired_entry_is_purged_on_get() {
        let (store, cache) = cache_with_store(50);
        seed_entry(&store, "old", 25);

        assert!(cache.get("old").is_none());
        // Deleted as a side effect, not just hidden
        assert_eq!(store.get("track_cache:old").unwrap(), None);
    }

    #[test]
    fn entry_within_ttl_survives_get() {
        let (store, cache) = cache_with_store(50);
        seed_entry(&store, "recent", 23);

        assert!(cache.get("recent").is_some());
    }

    #[test]
    fn corrupt_entry_is_treated_as_expired() {
        let (store, cache) = cache_with_store(50);
        store.set("track_cache:bad", "{not json").unwrap();

        assert!(cache.get("bad").is_none());
        assert_eq!(store.get("track_cache:bad").unwrap(), None);
    }

    #[test]
    fn list_orders_newest_first_and_purges_stale() {
        let (store, cache) = cache_with_store(50);
        seed_entry(&store, "a", 10);
        seed_entry(&store, "b", 1);
        seed_entry(&store, "c", 30); // expired
        store.set("track_cache:junk", "{not json").unwrap();

        let listed = cache.list();
        let ids: Vec<&str> = listed.iter().map(|e| e.track.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        assert_eq!(store.get("track_cache:c").unwrap(), None);
        assert_eq!(store.get("track_cache:junk").unwrap(), None);
    }

    #[test]
    fn list_never_exceeds_max_entries() {
        let (store, cache) = cache_with_store(3);
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            seed_entry(&store, id, i as i64);
        }

        assert_eq!(cache.list().len(), 3);
    }

    #[test]
    fn overflow_put_evicts_the_oldest() {
        let (store, cache) = cache_with_store(50);

        for i in 0..51 {
            cache.put(&complete_track(&format!("t{}", i)));
        }

        // First insert fell off the retention list and out of the store
        assert_eq!(store.get("track_cache:t0").unwrap(), None);
        assert!(cache.get("t50").is_some());
        assert_eq!(cache.list().len(), 50);
    }

    #[test]
    fn re_put_moves_entry_to_front() {
        let (_store, cache) = cache_with_store(2);

        cache.put(&complete_track("a"));
        cache.put(&complete_track("b"));
        // Refresh a, so b becomes the oldest
        cache.put(&complete_track("a"));
        cache.put(&complete_track("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn clear_removes_the_whole_namespace() {
        let (store, cache) = cache_with_store(50);
        cache.put(&complete_track("a"));
        cache.put(&complete_track("b"));
        store.set("other:keep", "kept").unwrap();

        cache.clear();

        assert!(cache.list().is_empty());
        assert_eq!(store.get("other:keep").unwrap(), Some("kept".to_string()));
    }

    #[test]
    fn retention_survives_reconstruction() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        {
            let cache = TrackCache::new(
                Arc::clone(&store) as Arc<dyn KeyValueStore>,
                CacheConfig { max_entries: 2, ttl_hours: 24 },
            );
            cache.put(&complete_track("a"));
            cache.put(&complete_track("b"));
        }

        // New cache over the same store picks the existing entries up
        let cache = TrackCache::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            CacheConfig { max_entries: 2, ttl_hours: 24 },
        );
        cache.put(&complete_track("c"));

        assert_eq!(cache.list().len(), 2);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn store_failures_degrade_to_misses() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_keys_with_prefix()
            .returning(|_| Err(AppError::Cache("disk gone".to_string())));
        store
            .expect_get()
            .returning(|_| Err(AppError::Cache("disk gone".to_string())));
        store
            .expect_set()
            .returning(|_, _| Err(AppError::Cache("disk gone".to_string())));

        let cache = TrackCache::new(Arc::new(store), CacheConfig::default());

        assert!(cache.put(&complete_track("t1")).is_none());
        assert!(cache.get("t1").is_none());
        assert!(cache.list().is_empty());
    }
}
