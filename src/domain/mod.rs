// src/domain/mod.rs
//
// Domain Root - The Single Source of Truth for Domain API
//
// This file declares all domain modules and re-exports their public API.
// All other modules import from `crate::domain::*`

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod cached_track;
pub mod generation;
pub mod track;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use cached_track::CachedTrack;
pub use generation::{ExtendOptions, Generation, GenerationOptions, Lyrics};
pub use track::{Track, TrackStatus};

// ============================================================================
// DOMAIN ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Domain-level errors
/// These represent violations of business rules and invariants
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Track {0} has no audio URL despite being complete")]
    MissingAudioUrl(String),

    #[error("Track {0} carries an audio URL but is not complete")]
    PrematureAudioUrl(String),

    #[error("Track id must not be empty")]
    EmptyTrackId,
}

// ============================================================================
// INVARIANT VALIDATION
// ============================================================================

/// Validate the track invariants.
///
/// The audio URL must be present if and only if the track is complete.
pub fn validate_track(track: &Track) -> Result<(), DomainError> {
    if track.id.is_empty() {
        return Err(DomainError::EmptyTrackId);
    }

    match (track.status, track.audio_url.is_some()) {
        (TrackStatus::Complete, false) => Err(DomainError::MissingAudioUrl(track.id.clone())),
        (status, true) if status != TrackStatus::Complete => {
            Err(DomainError::PrematureAudioUrl(track.id.clone()))
        }
        _ => Ok(()),
    }
}
