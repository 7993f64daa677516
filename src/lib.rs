// src/lib.rs
// Musegen - Client-side orchestration for asynchronous text-to-music generation
//
// Architecture:
// - Domain-centric: track/generation/cache invariants live in domain
// - Event-driven: the lifecycle manager publishes transitions on a bus
// - Explicit: no implicit behavior, no magic
// - Local-first: completed tracks are cached on this machine, time-bounded

// ============================================================================
// MODULES
// ============================================================================

pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod integrations;
pub mod repositories;
pub mod services;

// ============================================================================
// PUBLIC API - Domain Types
// ============================================================================

pub use domain::{
    validate_track,
    CachedTrack,
    DomainError,
    ExtendOptions,
    Generation,
    GenerationOptions,
    Lyrics,
    Track,
    TrackStatus,
};

// ============================================================================
// PUBLIC API - Error Types
// ============================================================================

pub use error::{AppError, AppResult};

// ============================================================================
// PUBLIC API - Events
// ============================================================================

pub use events::{
    create_event_bus,
    DomainEvent,
    EventBus,
    EventLogEntry,
    GenerationCancelled,
    GenerationCompleted,
    GenerationFailed,
    GenerationProgressUpdated,
    GenerationSubmitted,
    TrackCached,
};

// ============================================================================
// PUBLIC API - Database
// ============================================================================

pub use db::{
    create_connection_pool, create_connection_pool_at, initialize_database, ConnectionPool,
};

// ============================================================================
// PUBLIC API - Persistence
// ============================================================================

pub use repositories::{
    CacheConfig,
    InMemoryKeyValueStore,
    KeyValueStore,
    SqliteKeyValueStore,
    TrackCache,
};

// ============================================================================
// PUBLIC API - Integrations
// ============================================================================

pub use integrations::{ApiConfig, GenerationApi, HttpGenerationClient};

// ============================================================================
// PUBLIC API - Services
// ============================================================================

pub use services::{
    GenerationLifecycle,
    GenerationPhase,
    GenerationSnapshot,
    LifecycleConfig,
};
