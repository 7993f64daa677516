// src/domain/generation.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::track::Track;

/// A submitted request that produces a batch of one or more tracks.
///
/// Exists only in memory while the batch is being polled; discarded once all
/// member tracks are terminal or the caller cancels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Groups the track ids produced by one submission
    pub generation_id: String,

    pub tracks: Vec<Track>,

    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn new(generation_id: String, tracks: Vec<Track>) -> Self {
        Self {
            generation_id,
            tracks,
            created_at: Utc::now(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.tracks.len()
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }
}

/// Recognized options for a new generation submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Generation backend variant, service default when absent
    pub model: Option<String>,

    /// Suppress vocals
    pub make_instrumental: bool,

    /// Ask the service to hold the response until audio is ready
    pub wait_for_audio: bool,

    /// Free-text style hints
    pub tags: Option<String>,

    /// Optional user-supplied title
    pub title: Option<String>,
}

/// Options for continuing an existing track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendOptions {
    /// Seconds offset to continue from
    pub continue_at: Option<f32>,

    pub tags: Option<String>,

    pub title: Option<String>,

    pub make_instrumental: bool,
}

/// Result of a one-shot lyrics generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lyrics {
    pub text: String,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_ids_follow_batch_order() {
        let generation = Generation::new(
            "gen-1".into(),
            vec![
                Track::new("a".into(), "A".into(), "p".into()),
                Track::new("b".into(), "B".into(), "p".into()),
            ],
        );

        assert_eq!(generation.batch_size(), 2);
        assert_eq!(generation.track_ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
