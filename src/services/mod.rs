// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod generation_service;


// Re-export the lifecycle manager and its types
pub use generation_service::{
    GenerationLifecycle,
    GenerationPhase,
    GenerationSnapshot,
    LifecycleConfig,
};
