// src/services/generation_service.rs
//
// Generation Lifecycle Manager
//
// CRITICAL RULES:
// - Owns all in-flight generation state; the cache owns persisted state
// - Writes through to the cache, never reads it to drive polling
// - Single-flight polling: one scheduled poll task, next cycle only after
//   the previous fetch resolved
// - A response arriving after cancellation is discarded, never applied

use std::sync::{Arc, Mutex};
use std::time::Duration;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::domain::{ExtendOptions, Generation, GenerationOptions, Lyrics, Track, TrackStatus};
use crate::error::{AppError, AppResult};
use crate::events::{
    EventBus, GenerationCancelled, GenerationCompleted, GenerationFailed,
    GenerationProgressUpdated, GenerationSubmitted, TrackCached,
};
use crate::integrations::music_api::GenerationApi;
use crate::repositories::TrackCache;

/// Fixed progress value signalling that the service accepted the submission
const INITIAL_PROGRESS: u8 = 10;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub poll_interval_ms: u64,

    /// Poll budget per generation; exhausting it is a timeout, not a
    /// request failure
    pub max_poll_attempts: u32,

    /// Schedule the first poll as soon as a submission is accepted
    pub auto_start_polling: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            max_poll_attempts: 60,
            auto_start_polling: true,
        }
    }
}

/// Phase of the lifecycle state machine.
///
/// `Completed` and `Error` are stable until the next submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Idle,
    Generating,
    Polling,
    Completed,
    Error,
}

/// Immutable view of the manager state handed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSnapshot {
    pub phase: GenerationPhase,
    pub generation_id: Option<String>,
    pub tracks: Vec<Track>,
    pub progress: u8,
    pub poll_attempts: u32,
    pub error: Option<String>,
}

#[derive(Debug)]
struct LifecycleState {
    phase: GenerationPhase,
    generation_id: Option<String>,
    tracks: Vec<Track>,
    progress: u8,
    poll_attempts: u32,
    error: Option<String>,
}

impl LifecycleState {
    fn new() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            generation_id: None,
            tracks: Vec::new(),
            progress: 0,
            poll_attempts: 0,
            error: None,
        }
    }

    fn snapshot(&self) -> GenerationSnapshot {
        GenerationSnapshot {
            phase: self.phase,
            generation_id: self.generation_id.clone(),
            tracks: self.tracks.clone(),
            progress: self.progress,
            poll_attempts: self.poll_attempts,
            error: self.error.clone(),
        }
    }

    /// True while `session_id` still owns the polling state. A stale poll
    /// task (superseded or cancelled) observes this as false and stops
    /// without applying anything.
    fn owned_by(&self, session_id: &str) -> bool {
        self.phase == GenerationPhase::Polling
            && self.generation_id.as_deref() == Some(session_id)
    }
}

/// The Generation Lifecycle Manager.
///
/// One instance per logical session: state machine, progress, the polling
/// task and cache write-through all hang off this struct. Callers observe
/// via `snapshot()` or by subscribing to the event bus.
pub struct GenerationLifecycle {
    api: Arc<dyn GenerationApi>,
    cache: Arc<TrackCache>,
    event_bus: Arc<EventBus>,
    config: LifecycleConfig,
    state: Arc<Mutex<LifecycleState>>,
    poll_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GenerationLifecycle {
    pub fn new(
        api: Arc<dyn GenerationApi>,
        cache: Arc<TrackCache>,
        event_bus: Arc<EventBus>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            api,
            cache,
            event_bus,
            config,
            state: Arc::new(Mutex::new(LifecycleState::new())),
            poll_task: Arc::new(Mutex::new(None)),
        }
    }

    pub fn snapshot(&self) -> GenerationSnapshot {
        self.state.lock().unwrap().snapshot()
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Submit a new generation.
    ///
    /// Returns once the submission is accepted or rejected; completion of
    /// the generation itself is observed through polling. An accepted
    /// submission moves to `Polling` at the fixed acceptance progress and,
    /// unless `auto_start_polling` is off, schedules the first poll.
    pub async fn submit_generation(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> AppResult<GenerationSnapshot> {
        self.begin();
        let result = self.api.submit(prompt, options).await;
        self.accept(result)
    }

    /// Continue an existing track. Same lifecycle shape as
    /// `submit_generation`.
    pub async fn extend_track(
        &self,
        track_id: &str,
        prompt: &str,
        options: &ExtendOptions,
    ) -> AppResult<GenerationSnapshot> {
        self.begin();
        let result = self.api.extend(track_id, prompt, options).await;
        self.accept(result)
    }

    /// One-shot lyrics generation. Does not touch the phase machine:
    /// failure is reported through the return channel plus the shared error
    /// string.
    pub async fn generate_lyrics(&self, prompt: &str) -> Option<Lyrics> {
        match self.api.generate_lyrics(prompt).await {
            Ok(lyrics) => Some(lyrics),
            Err(e) => {
                self.state.lock().unwrap().error = Some(e.to_string());
                None
            }
        }
    }

    /// Cache-first track lookup. A remote hit that is complete is cached
    /// opportunistically before returning.
    pub async fn get_track(&self, track_id: &str) -> AppResult<Option<Track>> {
        if let Some(cached) = self.cache.get(track_id) {
            return Ok(Some(cached.track));
        }

        let fetched = self.api.fetch_by_ids(&[track_id.to_string()]).await?;
        let Some(track) = fetched.into_iter().find(|t| t.id == track_id) else {
            return Ok(None);
        };

        if track.status == TrackStatus::Complete {
            if let Some(entry) = self.cache.put(&track) {
                self.event_bus
                    .emit(TrackCached::new(entry.track.id.clone(), entry.cache_id));
            }
        }

        Ok(Some(track))
    }

    /// Explicit cancellation: clears the scheduled poll, resets progress and
    /// generation id, and notifies the remote service on a detached task.
    /// Notification failures are logged, never surfaced.
    pub fn cancel(&self) {
        self.stop_poll_task();

        let cancelled_id = {
            let mut state = self.state.lock().unwrap();
            let id = state.generation_id.take();
            state.phase = GenerationPhase::Idle;
            state.progress = 0;
            state.poll_attempts = 0;
            id
        };

        if let Some(generation_id) = cancelled_id {
            let api = Arc::clone(&self.api);
            let id = generation_id.clone();
            tokio::spawn(async move {
                if let Err(e) = api.cancel(&id).await {
                    log::warn!("failed to notify remote of cancellation for {}: {}", id, e);
                }
            });

            self.event_bus.emit(GenerationCancelled::new(generation_id));
        }
    }

    /// Schedule polling for an already-accepted submission (only needed when
    /// `auto_start_polling` is off).
    pub fn start_polling(&self) {
        let session_id = {
            let state = self.state.lock().unwrap();
            match state.phase {
                GenerationPhase::Polling => state.generation_id.clone(),
                _ => None,
            }
        };

        if let Some(id) = session_id {
            self.spawn_poll_task(id);
        }
    }

    /// Local reset only; no remote or cache side effects.
    pub fn clear_error(&self) {
        self.state.lock().unwrap().error = None;
    }

    /// Local reset only; no remote or cache side effects.
    pub fn clear_tracks(&self) {
        self.state.lock().unwrap().tracks.clear();
    }

    /// Reset shared state for a fresh submission and drop any scheduled poll.
    fn begin(&self) {
        self.stop_poll_task();

        let mut state = self.state.lock().unwrap();
        state.phase = GenerationPhase::Generating;
        state.generation_id = None;
        state.tracks.clear();
        state.progress = 0;
        state.poll_attempts = 0;
        state.error = None;
    }

    /// Apply the outcome of a submit/extend call.
    fn accept(&self, result: AppResult<Generation>) -> AppResult<GenerationSnapshot> {
        match result {
            Ok(generation) if generation.tracks.is_empty() => {
                // A batch with no members can never terminate
                self.accept(Err(AppError::Api {
                    status: 200,
                    message: "Submission returned no tracks".to_string(),
                }))
            }
            Ok(generation) => {
                let snapshot = {
                    let mut state = self.state.lock().unwrap();
                    state.generation_id = Some(generation.generation_id.clone());
                    state.tracks = generation.tracks.clone();
                    state.phase = GenerationPhase::Polling;
                    state.progress = INITIAL_PROGRESS;
                    state.snapshot()
                };

                self.event_bus.emit(GenerationSubmitted::new(
                    generation.generation_id.clone(),
                    generation.track_ids(),
                ));

                if self.config.auto_start_polling {
                    self.spawn_poll_task(generation.generation_id);
                }

                Ok(snapshot)
            }
            Err(e) => {
                let message = e.to_string();
                {
                    let mut state = self.state.lock().unwrap();
                    state.phase = GenerationPhase::Error;
                    state.error = Some(message.clone());
                }
                self.event_bus.emit(GenerationFailed::new(None, message));
                Err(e)
            }
        }
    }

    fn spawn_poll_task(&self, session_id: String) {
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let event_bus = Arc::clone(&self.event_bus);
        let state = Arc::clone(&self.state);
        let config = self.config.clone();

        let task = tokio::spawn(run_poll_loop(
            api, cache, event_bus, state, config, session_id,
        ));

        let mut handle = self.poll_task.lock().unwrap();
        if let Some(prev) = handle.replace(task) {
            prev.abort();
        }
    }

    fn stop_poll_task(&self) {
        let mut handle = self.poll_task.lock().unwrap();
        if let Some(task) = handle.take() {
            task.abort();
        }
    }
}

impl Drop for GenerationLifecycle {
    fn drop(&mut self) {
        self.stop_poll_task();
    }
}

/// Outcome of applying one poll cycle's fetch result.
enum PollOutcome {
    Completed {
        completed: Vec<Track>,
        failed_ids: Vec<String>,
    },
    InFlight {
        progress: u8,
        terminal_count: usize,
        total_count: usize,
    },
}

/// The polling loop, one task per accepted generation.
///
/// Every state application re-checks that `session_id` still owns the
/// manager state, so a cycle that resolves after cancellation or a
/// superseding submit is discarded.
async fn run_poll_loop(
    api: Arc<dyn GenerationApi>,
    cache: Arc<TrackCache>,
    event_bus: Arc<EventBus>,
    state: Arc<Mutex<LifecycleState>>,
    config: LifecycleConfig,
    session_id: String,
) {
    let interval = Duration::from_millis(config.poll_interval_ms);

    loop {
        tokio::time::sleep(interval).await;

        // Attempt budget first, then snapshot the batch ids for the fetch
        let ids = {
            let mut guard = state.lock().unwrap();
            if !guard.owned_by(&session_id) {
                break;
            }

            if guard.poll_attempts >= config.max_poll_attempts {
                let message = AppError::PollingTimeout {
                    attempts: guard.poll_attempts,
                }
                .to_string();
                guard.phase = GenerationPhase::Error;
                guard.error = Some(message.clone());
                drop(guard);

                event_bus.emit(GenerationFailed::new(Some(session_id.clone()), message));
                break;
            }

            guard.tracks.iter().map(|t| t.id.clone()).collect::<Vec<_>>()
        };

        let outcome = match api.fetch_by_ids(&ids).await {
            Err(e) => {
                let message = e.to_string();
                let mut guard = state.lock().unwrap();
                if !guard.owned_by(&session_id) {
                    break;
                }
                guard.phase = GenerationPhase::Error;
                guard.error = Some(message.clone());
                drop(guard);

                event_bus.emit(GenerationFailed::new(Some(session_id.clone()), message));
                break;
            }
            Ok(updates) => {
                let mut guard = state.lock().unwrap();
                if !guard.owned_by(&session_id) {
                    break;
                }

                for update in updates {
                    if let Some(track) = guard.tracks.iter_mut().find(|t| t.id == update.id) {
                        track.apply_update(update);
                    }
                }

                let total_count = guard.tracks.len();
                let terminal_count = guard
                    .tracks
                    .iter()
                    .filter(|t| t.status.is_terminal())
                    .count();

                if terminal_count == total_count {
                    guard.progress = 100;
                    guard.phase = GenerationPhase::Completed;

                    PollOutcome::Completed {
                        completed: guard
                            .tracks
                            .iter()
                            .filter(|t| t.status == TrackStatus::Complete)
                            .cloned()
                            .collect(),
                        failed_ids: guard
                            .tracks
                            .iter()
                            .filter(|t| t.status == TrackStatus::Error)
                            .map(|t| t.id.clone())
                            .collect(),
                    }
                } else {
                    let computed =
                        ((terminal_count as f32 / total_count as f32) * 100.0).min(100.0) as u8;
                    // Never below the acceptance bump or a prior cycle's value
                    guard.progress = guard.progress.max(computed);
                    guard.poll_attempts += 1;

                    PollOutcome::InFlight {
                        progress: guard.progress,
                        terminal_count,
                        total_count,
                    }
                }
            }
        };

        match outcome {
            PollOutcome::Completed {
                completed,
                failed_ids,
            } => {
                let completed_ids: Vec<String> =
                    completed.iter().map(|t| t.id.clone()).collect();

                // Write-through; cache failures degrade inside TrackCache
                for track in &completed {
                    if let Some(entry) = cache.put(track) {
                        event_bus
                            .emit(TrackCached::new(entry.track.id.clone(), entry.cache_id));
                    }
                }

                event_bus.emit(GenerationCompleted::new(
                    session_id.clone(),
                    completed_ids,
                    failed_ids,
                ));
                break;
            }
            PollOutcome::InFlight {
                progress,
                terminal_count,
                total_count,
            } => {
                event_bus.emit(GenerationProgressUpdated::new(
                    session_id.clone(),
                    progress,
                    terminal_count,
                    total_count,
                ));
            }
        }
    }
}
