// src/events/types.rs
//
// All lifecycle events in the system.
// Each event represents an immutable fact that has already occurred.
//
// CRITICAL RULES:
// - Events are facts, not commands
// - Events are immutable
// - Events carry only the data needed to react
// - No business logic in event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait that all lifecycle events must implement
pub trait DomainEvent: std::fmt::Debug + Clone {
    /// Unique identifier for this event instance
    fn event_id(&self) -> Uuid;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;
}

// ============================================================================
// GENERATION LIFECYCLE EVENTS
// ============================================================================

/// Emitted when the remote service accepts a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSubmitted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub generation_id: String,
    pub track_ids: Vec<String>,
}

impl GenerationSubmitted {
    pub fn new(generation_id: String, track_ids: Vec<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            generation_id,
            track_ids,
        }
    }
}

impl DomainEvent for GenerationSubmitted {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "GenerationSubmitted" }
}

/// Emitted after each poll cycle that advanced (or confirmed) progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationProgressUpdated {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub generation_id: String,
    pub progress: u8,
    pub terminal_count: usize,
    pub total_count: usize,
}

impl GenerationProgressUpdated {
    pub fn new(
        generation_id: String,
        progress: u8,
        terminal_count: usize,
        total_count: usize,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            generation_id,
            progress,
            terminal_count,
            total_count,
        }
    }
}

impl DomainEvent for GenerationProgressUpdated {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "GenerationProgressUpdated" }
}

/// Emitted once every track in the batch reached a terminal status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationCompleted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub generation_id: String,
    pub completed_track_ids: Vec<String>,
    pub failed_track_ids: Vec<String>,
}

impl GenerationCompleted {
    pub fn new(
        generation_id: String,
        completed_track_ids: Vec<String>,
        failed_track_ids: Vec<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            generation_id,
            completed_track_ids,
            failed_track_ids,
        }
    }
}

impl DomainEvent for GenerationCompleted {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "GenerationCompleted" }
}

/// Emitted when a submission or poll cycle fails, or the attempt budget
/// runs out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationFailed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    /// Absent when the submission itself never yielded a generation id
    pub generation_id: Option<String>,
    pub message: String,
}

impl GenerationFailed {
    pub fn new(generation_id: Option<String>, message: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            generation_id,
            message,
        }
    }
}

impl DomainEvent for GenerationFailed {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "GenerationFailed" }
}

/// Emitted on explicit caller cancellation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationCancelled {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub generation_id: String,
}

impl GenerationCancelled {
    pub fn new(generation_id: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            generation_id,
        }
    }
}

impl DomainEvent for GenerationCancelled {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "GenerationCancelled" }
}

// ============================================================================
// CACHE EVENTS
// ============================================================================

/// Emitted when a completed track is written through to the local cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackCached {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub track_id: String,
    pub cache_id: Uuid,
}

impl TrackCached {
    pub fn new(track_id: String, cache_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            track_id,
            cache_id,
        }
    }
}

impl DomainEvent for TrackCached {
    fn event_id(&self) -> Uuid { self.event_id }
    fn occurred_at(&self) -> DateTime<Utc> { self.occurred_at }
    fn event_type(&self) -> &'static str { "TrackCached" }
}
