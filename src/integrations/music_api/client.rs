// src/integrations/music_api/client.rs
//
// Remote Generation Service client
//
// ARCHITECTURE:
// - REST client for the text-to-music generation API
// - Handles authentication, request throttling, error mapping
// - Maps wire payloads → domain types (NO domain mutation)
// - Consumed by GenerationLifecycle through the GenerationApi trait
//
// CRITICAL RULES:
// - This is INFRASTRUCTURE, not DOMAIN
// - A missing credential fails fast, before any network attempt
// - Returns domain types that services can use directly

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::{ExtendOptions, Generation, GenerationOptions, Lyrics, Track, TrackStatus};
use crate::error::{AppError, AppResult};

/// Remote Generation Service contract.
///
/// Repeated fetches are idempotent; `cancel` is best-effort and callers are
/// expected to ignore its failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Submit a new generation; returns the accepted batch.
    async fn submit(&self, prompt: &str, options: &GenerationOptions) -> AppResult<Generation>;

    /// Fetch the current state of the given tracks.
    async fn fetch_by_ids(&self, ids: &[String]) -> AppResult<Vec<Track>>;

    /// Continue an existing track from an offset.
    async fn extend(
        &self,
        track_id: &str,
        prompt: &str,
        options: &ExtendOptions,
    ) -> AppResult<Generation>;

    /// One-shot lyrics generation.
    async fn generate_lyrics(&self, prompt: &str) -> AppResult<Lyrics>;

    /// Ask the service to abandon an in-flight generation.
    async fn cancel(&self, generation_id: &str) -> AppResult<()>;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,

    /// Bearer credential; every call fails fast when absent
    pub api_key: Option<String>,

    pub request_timeout_secs: u64,

    /// Minimum gap between consecutive outbound calls
    pub min_request_interval_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.musegen.example".to_string(),
            api_key: None,
            request_timeout_secs: 30,
            min_request_interval_ms: 1000,
        }
    }
}

/// Client-side throttle: consecutive calls queue behind a minimum
/// inter-request delay rather than failing.
struct RequestThrottle {
    min_interval: Duration,
    last_request: Mutex<Instant>,
}

impl RequestThrottle {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            // Far enough in the past that the first call never waits
            last_request: Mutex::new(Instant::now() - min_interval),
        }
    }

    /// Waits out the remainder of the interval. The lock is held across the
    /// sleep so concurrent callers line up one behind another.
    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

// ============================================================================
// WIRE PAYLOADS
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    id: String,
    clips: Vec<ClipPayload>,
}

#[derive(Debug, Deserialize)]
struct ClipPayload {
    id: String,
    status: String,
    title: Option<String>,
    audio_url: Option<String>,
    #[serde(default)]
    metadata: ClipMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ClipMetadata {
    prompt: Option<String>,
    tags: Option<String>,
    duration: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    text: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(alias = "detail", alias = "error")]
    message: Option<String>,
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

pub struct HttpGenerationClient {
    config: ApiConfig,
    http_client: Client,
    throttle: RequestThrottle,
}

impl HttpGenerationClient {
    pub fn new(config: ApiConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let throttle =
            RequestThrottle::new(Duration::from_millis(config.min_request_interval_ms));

        Self {
            config,
            http_client,
            throttle,
        }
    }

    /// Create a client with a bearer credential and default configuration
    pub fn with_api_key(api_key: String) -> Self {
        Self::new(ApiConfig {
            api_key: Some(api_key),
            ..ApiConfig::default()
        })
    }

    /// Fail fast when no credential is configured. Checked before the
    /// throttle so a misconfigured client never reaches the network.
    fn credential(&self) -> AppResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("No API credential configured".to_string()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post_json<T>(&self, path: &str, body: serde_json::Value) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let token = self.credential()?.to_string();
        self.throttle.wait_turn().await;

        let response = self
            .http_client
            .post(self.endpoint(path))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        Self::decode_response(response).await
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let token = self.credential()?.to_string();
        self.throttle.wait_turn().await;

        let response = self
            .http_client
            .get(self.endpoint(path))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .query(query)
            .send()
            .await?;

        Self::decode_response(response).await
    }

    async fn decode_response<T>(response: reqwest::Response) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();

        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }

        response.json::<T>().await.map_err(|e| AppError::Api {
            status: status.as_u16(),
            message: format!("Malformed response body: {}", e),
        })
    }

    /// Build an ApiError from a non-2xx response, salvaging the message the
    /// service put in the body when there is one.
    async fn api_error(status: StatusCode, response: reqwest::Response) -> AppError {
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&raw)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    format!("Request failed with status {}", status)
                } else {
                    raw
                }
            });

        AppError::Api {
            status: status.as_u16(),
            message,
        }
    }

    /// Map a wire clip to a domain track.
    ///
    /// Unknown statuses normalize to `Submitted`; the audio URL is kept only
    /// for complete tracks, which upholds the domain invariant at the edge.
    fn map_clip_to_track(clip: ClipPayload) -> Track {
        let status = parse_status(&clip.status);

        Track {
            id: clip.id,
            status,
            title: clip.title.unwrap_or_default(),
            prompt: clip.metadata.prompt.unwrap_or_default(),
            tags: clip.metadata.tags,
            audio_url: if status == TrackStatus::Complete {
                clip.audio_url
            } else {
                None
            },
            duration_seconds: clip.metadata.duration,
            created_at: chrono::Utc::now(),
        }
    }

    fn map_generation(response: GenerationResponse) -> Generation {
        let tracks = response
            .clips
            .into_iter()
            .map(Self::map_clip_to_track)
            .collect();
        Generation::new(response.id, tracks)
    }
}

fn parse_status(raw: &str) -> TrackStatus {
    match raw {
        "submitted" => TrackStatus::Submitted,
        "queued" => TrackStatus::Queued,
        "streaming" => TrackStatus::Streaming,
        "complete" => TrackStatus::Complete,
        "error" => TrackStatus::Error,
        other => {
            log::debug!("unknown track status {:?}, treating as submitted", other);
            TrackStatus::Submitted
        }
    }
}

#[async_trait]
impl GenerationApi for HttpGenerationClient {
    async fn submit(&self, prompt: &str, options: &GenerationOptions) -> AppResult<Generation> {
        let body = json!({
            "prompt": prompt,
            "model": options.model,
            "make_instrumental": options.make_instrumental,
            "wait_audio": options.wait_for_audio,
            "tags": options.tags,
            "title": options.title,
        });

        let response: GenerationResponse = self.post_json("/api/generate", body).await?;
        Ok(Self::map_generation(response))
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> AppResult<Vec<Track>> {
        let query = [("ids", ids.join(","))];

        let clips: Vec<ClipPayload> = self.get_json("/api/get", &query).await?;
        Ok(clips.into_iter().map(Self::map_clip_to_track).collect())
    }

    async fn extend(
        &self,
        track_id: &str,
        prompt: &str,
        options: &ExtendOptions,
    ) -> AppResult<Generation> {
        let body = json!({
            "audio_id": track_id,
            "prompt": prompt,
            "continue_at": options.continue_at,
            "tags": options.tags,
            "title": options.title,
            "make_instrumental": options.make_instrumental,
        });

        let response: GenerationResponse = self.post_json("/api/extend_audio", body).await?;
        Ok(Self::map_generation(response))
    }

    async fn generate_lyrics(&self, prompt: &str) -> AppResult<Lyrics> {
        let body = json!({ "prompt": prompt });

        let response: LyricsResponse = self.post_json("/api/generate_lyrics", body).await?;
        Ok(Lyrics {
            text: response.text,
            title: response.title,
        })
    }

    async fn cancel(&self, generation_id: &str) -> AppResult<()> {
        let body = json!({ "generation_id": generation_id });

        // The ack body carries nothing we use
        let _: serde_json::Value = self.post_json("/api/cancel", body).await?;
        Ok(())
    }
}
