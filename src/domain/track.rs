// src/domain/track.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote-assigned status of a track.
///
/// Declaration order defines the forward progression; a track never moves
/// backwards. `Complete` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Submitted,
    Queued,
    Streaming,
    Complete,
    Error,
}

impl TrackStatus {
    /// True once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Complete | TrackStatus::Error)
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackStatus::Submitted => "submitted",
            TrackStatus::Queued => "queued",
            TrackStatus::Streaming => "streaming",
            TrackStatus::Complete => "complete",
            TrackStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One generated (or in-progress) audio artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Opaque identifier assigned by the remote service on submission
    pub id: String,

    pub status: TrackStatus,

    pub title: String,

    /// The prompt this track was generated from
    pub prompt: String,

    /// Free-text style hints, comma separated
    pub tags: Option<String>,

    /// Present iff `status == Complete`
    pub audio_url: Option<String>,

    pub duration_seconds: Option<f32>,

    pub created_at: DateTime<Utc>,
}

impl Track {
    pub fn new(id: String, title: String, prompt: String) -> Self {
        Self {
            id,
            status: TrackStatus::Submitted,
            title,
            prompt,
            tags: None,
            audio_url: None,
            duration_seconds: None,
            created_at: Utc::now(),
        }
    }

    /// Apply a freshly fetched snapshot of this track.
    ///
    /// Remote listings are eventually consistent; a status below the one we
    /// already hold is ignored so the local view never regresses.
    pub fn apply_update(&mut self, fetched: Track) {
        if fetched.status < self.status {
            return;
        }
        self.status = fetched.status;
        self.title = fetched.title;
        self.tags = fetched.tags;
        self.audio_url = fetched.audio_url;
        self.duration_seconds = fetched.duration_seconds;
    }
}
