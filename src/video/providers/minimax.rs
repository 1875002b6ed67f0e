//! MiniMax Hailuo video generation provider (image-to-video).

use crate::error::{classify_http_error, sanitize_error_message, Result, VidGenError};
use crate::video::provider::VideoProvider;
use crate::video::types::{
    GeneratedVideo, VideoGenerationRequest, VideoMetadata, VideoProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://api.minimaxi.chat/v1";

/// MiniMax Hailuo image-to-video models.
///
/// The named variants are the documented models; any other model id goes
/// through `Custom` unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MiniMaxVideoModel {
    /// I2V-01-Director, supports camera instructions in the prompt (default).
    #[default]
    I2V01Director,
    /// I2V-01 base model.
    I2V01,
    /// I2V-01-live, tuned for illustrations.
    I2V01Live,
    /// MiniMax-Hailuo-02.
    Hailuo02,
    /// Any other model id accepted by the API.
    Custom(String),
}

impl MiniMaxVideoModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::I2V01Director => "I2V-01-Director",
            Self::I2V01 => "I2V-01",
            Self::I2V01Live => "I2V-01-live",
            Self::Hailuo02 => "MiniMax-Hailuo-02",
            Self::Custom(id) => id,
        }
    }
}

impl From<&str> for MiniMaxVideoModel {
    fn from(id: &str) -> Self {
        match id {
            "I2V-01-Director" => Self::I2V01Director,
            "I2V-01" => Self::I2V01,
            "I2V-01-live" => Self::I2V01Live,
            "MiniMax-Hailuo-02" => Self::Hailuo02,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for `MiniMaxVideoProvider`.
#[derive(Debug, Clone)]
pub struct MiniMaxVideoProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    model: MiniMaxVideoModel,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for MiniMaxVideoProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            model: MiniMaxVideoModel::default(),
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1800),
        }
    }
}

impl MiniMaxVideoProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `MINIMAX_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the MiniMax video model.
    pub fn model(mut self, model: impl Into<MiniMaxVideoModel>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum time to wait for generation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<MiniMaxVideoProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("MINIMAX_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                VidGenError::Auth("MINIMAX_API_KEY not set and no API key provided".into())
            })?;

        Ok(MiniMaxVideoProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self.base_url,
            model: self.model,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// MiniMax Hailuo video generation provider.
#[derive(Debug)]
pub struct MiniMaxVideoProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: MiniMaxVideoModel,
    poll_interval: Duration,
    timeout: Duration,
}

impl MiniMaxVideoProvider {
    /// Creates a new `MiniMaxVideoProviderBuilder`.
    pub fn builder() -> MiniMaxVideoProviderBuilder {
        MiniMaxVideoProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> &MiniMaxVideoModel {
        &self.model
    }

    /// Submit a video generation request.
    async fn submit(&self, body: &MiniMaxVideoRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/video_generation", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text, &headers));
        }

        let submit_response: MiniMaxSubmitResponse = response.json().await?;

        // status_code != 0 means the request was rejected
        if let Some(ref base_resp) = submit_response.base_resp {
            if base_resp.status_code != 0 {
                return Err(VidGenError::Api {
                    status: u16::try_from(base_resp.status_code).unwrap_or(0),
                    message: sanitize_error_message(&base_resp.status_msg),
                });
            }
        }

        submit_response
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VidGenError::UnexpectedResponse("No task_id in MiniMax response".into()))
    }

    /// Poll until the video is ready, returning the file_id and poll count.
    async fn poll_until_ready(&self, task_id: &str) -> Result<(String, u32)> {
        let url = format!("{}/query/video_generation", self.base_url);
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            if start.elapsed() > self.timeout {
                return Err(VidGenError::Timeout(self.timeout));
            }
            attempts += 1;

            let response = self
                .client
                .get(&url)
                .query(&[("task_id", task_id)])
                .header("Authorization", format!("Bearer {}", self.api_key))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let headers = response.headers().clone();
                let text = response.text().await.unwrap_or_default();
                return Err(classify_http_error(status.as_u16(), &text, &headers));
            }

            let poll_response: MiniMaxPollResponse = response.json().await?;
            tracing::info!(
                task_id = %task_id,
                attempt = attempts,
                status = %poll_response.status,
                elapsed_secs = start.elapsed().as_secs(),
                "polling MiniMax video generation"
            );

            let file_id = poll_response.file_id.filter(|id| !id.is_empty());
            match (poll_response.status.as_str(), file_id) {
                ("Success", Some(file_id)) => return Ok((file_id, attempts)),
                ("Fail" | "Error" | "Unknown", _) => {
                    let msg = poll_response
                        .base_resp
                        .map(|r| r.status_msg)
                        .filter(|s| !s.is_empty())
                        .unwrap_or_else(|| {
                            format!("task ended with status {}", poll_response.status)
                        });
                    return Err(VidGenError::VideoGeneration(sanitize_error_message(&msg)));
                }
                // Preparing, Queueing, Processing, or Success before file_id is set
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    /// Fetch the download URL for a file_id.
    async fn fetch_file_url(&self, file_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/files/retrieve", self.base_url))
            .query(&[("file_id", file_id)])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text, &headers));
        }

        let file_response: MiniMaxFileResponse = response.json().await?;
        file_response
            .file
            .and_then(|f| f.download_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                VidGenError::UnexpectedResponse("No download URL in MiniMax file response".into())
            })
    }

    /// Download the video from the given URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(VidGenError::Api {
                status: response.status().as_u16(),
                message: "Failed to download video".into(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl VideoProvider for MiniMaxVideoProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let image = request.require_image("MiniMax")?;
        let encode_start = Instant::now();
        let body = MiniMaxVideoRequest {
            model: self.model.as_str().to_string(),
            prompt: request.prompt.clone(),
            first_frame_image: image.data_url()?,
        };
        tracing::debug!(
            image = %image,
            elapsed_ms = encode_start.elapsed().as_millis() as u64,
            "encoded first frame"
        );

        let start = Instant::now();
        let task_id = self.submit(&body).await?;
        let submit_ms = start.elapsed().as_millis() as u64;
        tracing::info!(task_id = %task_id, submit_ms, "submitted MiniMax video generation task");

        let generation_start = Instant::now();
        let (file_id, poll_attempts) = self.poll_until_ready(&task_id).await?;
        let generation_ms = generation_start.elapsed().as_millis() as u64;
        tracing::info!(file_id = %file_id, "MiniMax video generation complete");

        let download_url = self.fetch_file_url(&file_id).await?;
        tracing::debug!(url = %download_url, "fetched MiniMax video download URL");

        let data = self.download(&download_url).await?;

        Ok(GeneratedVideo::new(
            data,
            "video/mp4",
            VideoProviderKind::MiniMax,
            VideoMetadata {
                model: Some(self.model.as_str().to_string()),
                task_id: Some(task_id),
                duration_ms: Some(start.elapsed().as_millis() as u64),
                submit_ms: Some(submit_ms),
                generation_ms: Some(generation_ms),
                poll_attempts: Some(poll_attempts),
                video_duration_secs: None,
                aspect_ratio: None,
                source_url: Some(download_url),
            },
        ))
    }

    fn kind(&self) -> VideoProviderKind {
        VideoProviderKind::MiniMax
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            Err(VidGenError::Auth("API key is empty".into()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MiniMaxVideoRequest {
    model: String,
    prompt: String,
    first_frame_image: String,
}

// Submit response
#[derive(Debug, Deserialize)]
struct MiniMaxSubmitResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    base_resp: Option<MiniMaxBaseResp>,
}

#[derive(Debug, Deserialize)]
struct MiniMaxBaseResp {
    #[serde(default)]
    status_code: i32,
    #[serde(default)]
    status_msg: String,
}

// Poll response
#[derive(Debug, Deserialize)]
struct MiniMaxPollResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    base_resp: Option<MiniMaxBaseResp>,
}

// File retrieve response
#[derive(Debug, Deserialize)]
struct MiniMaxFileResponse {
    #[serde(default)]
    file: Option<MiniMaxFileInfo>,
}

#[derive(Debug, Deserialize)]
struct MiniMaxFileInfo {
    #[serde(default)]
    download_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
