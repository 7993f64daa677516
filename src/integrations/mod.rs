// src/integrations/mod.rs
//
// External Integrations Module

pub mod music_api;

pub use music_api::{ApiConfig, GenerationApi, HttpGenerationClient};
