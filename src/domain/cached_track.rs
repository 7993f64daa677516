// src/domain/cached_track.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::track::Track;

/// A completed track as persisted by the local cache.
///
/// `cache_id` is a locally generated surrogate, distinct from the remote
/// track id the entry is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTrack {
    pub cache_id: Uuid,

    pub track: Track,

    /// Timestamp of the cache write, drives expiry
    pub cached_at: DateTime<Utc>,
}

impl CachedTrack {
    pub fn new(track: Track) -> Self {
        Self {
            cache_id: Uuid::new_v4(),
            track,
            cached_at: Utc::now(),
        }
    }

    /// True once the entry has outlived `ttl` relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now > self.cached_at + ttl
    }
}
