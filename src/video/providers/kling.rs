//! Kling video generation through PiAPI (image-to-video).

use crate::error::{classify_http_error, sanitize_error_message, Result, VidGenError};
use crate::video::provider::VideoProvider;
use crate::video::types::{
    ensure_image_exists, GeneratedVideo, ImageSource, VideoGenerationRequest, VideoMetadata,
    VideoProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://api.piapi.ai/api/v1";

/// PiAPI reports success in the body with this code.
const PIAPI_OK: i64 = 200;

/// Kling model versions offered by PiAPI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KlingVideoModel {
    /// Kling 1.0.
    V1_0,
    /// Kling 1.5.
    V1_5,
    /// Kling 1.6.
    V1_6,
    /// Kling 2.0 (default).
    #[default]
    V2_0,
    /// Kling 2.1.
    V2_1,
}

impl KlingVideoModel {
    /// Returns the `version` string PiAPI expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_5 => "1.5",
            Self::V1_6 => "1.6",
            Self::V2_0 => "2.0",
            Self::V2_1 => "2.1",
        }
    }
}

/// Kling video generation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KlingVideoMode {
    /// Standard mode - faster, lower cost.
    #[default]
    Std,
    /// Professional mode - higher quality, slower.
    Pro,
}

impl KlingVideoMode {
    /// Returns the API mode string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Std => "std",
            Self::Pro => "pro",
        }
    }
}

const SUPPORTED_DURATIONS: [u32; 2] = [5, 10];
const SUPPORTED_ASPECT_RATIOS: [&str; 3] = ["16:9", "9:16", "1:1"];
const DEFAULT_DURATION: u32 = 5;
const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Builder for KlingVideoProvider.
#[derive(Debug, Clone)]
pub struct KlingVideoProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    model: KlingVideoModel,
    mode: KlingVideoMode,
    cfg_scale: f32,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for KlingVideoProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            model: KlingVideoModel::default(),
            mode: KlingVideoMode::default(),
            cfg_scale: 0.5,
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1800),
        }
    }
}

impl KlingVideoProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `PIAPI_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the PiAPI base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the Kling model version.
    pub fn model(mut self, model: KlingVideoModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the generation mode (std or pro).
    pub fn mode(mut self, mode: KlingVideoMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the prompt adherence (`cfg_scale`).
    pub fn cfg_scale(mut self, cfg_scale: f32) -> Self {
        self.cfg_scale = cfg_scale;
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
    pub fn build(self) -> Result<KlingVideoProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("PIAPI_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| VidGenError::Auth("PIAPI_KEY not set and no API key provided".into()))?;

        Ok(KlingVideoProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self.base_url,
            model: self.model,
            mode: self.mode,
            cfg_scale: self.cfg_scale,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// Kling image-to-video provider backed by PiAPI.
#[derive(Debug)]
pub struct KlingVideoProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: KlingVideoModel,
    mode: KlingVideoMode,
    cfg_scale: f32,
    poll_interval: Duration,
    timeout: Duration,
}

/// Where a finished task's video lives, plus how long it took to get there.
struct CompletedTask {
    video_url: String,
    poll_attempts: u32,
}

impl KlingVideoProvider {
    /// Creates a new `KlingVideoProviderBuilder`.
    pub fn builder() -> KlingVideoProviderBuilder {
        KlingVideoProviderBuilder::new()
    }

    /// Returns the configured model version.
    pub fn model(&self) -> KlingVideoModel {
        self.model
    }

    /// Returns the configured mode.
    pub fn mode(&self) -> KlingVideoMode {
        self.mode
    }

    fn build_body(&self, request: &VideoGenerationRequest) -> Result<PiApiTaskRequest> {
        let image_url = match request.require_image("Kling")? {
            ImageSource::Url(url) => url.clone(),
            ImageSource::File(path) => {
                ensure_image_exists(path)?;
                return Err(VidGenError::InvalidRequest(format!(
                    "Kling (PiAPI) cannot take a local file ('{}'); host the image and pass its URL instead",
                    path.display()
                )));
            }
        };

        let duration = request.duration_secs.unwrap_or(DEFAULT_DURATION);
        if !SUPPORTED_DURATIONS.contains(&duration) {
            return Err(VidGenError::InvalidRequest(format!(
                "Kling duration must be 5 or 10 seconds, got {duration}"
            )));
        }

        let aspect_ratio = request
            .aspect_ratio
            .clone()
            .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string());
        if !SUPPORTED_ASPECT_RATIOS.contains(&aspect_ratio.as_str()) {
            return Err(VidGenError::InvalidRequest(format!(
                "Kling aspect ratio must be one of 16:9, 9:16, 1:1, got {aspect_ratio}"
            )));
        }

        Ok(PiApiTaskRequest {
            model: "kling".to_string(),
            task_type: "video_generation".to_string(),
            input: KlingTaskInput {
                prompt: request.prompt.clone(),
                negative_prompt: request.negative_prompt.clone().unwrap_or_default(),
                cfg_scale: self.cfg_scale,
                duration,
                aspect_ratio,
                mode: self.mode.as_str().to_string(),
                version: self.model.as_str().to_string(),
                image_url,
            },
        })
    }

    fn map_body_error(code: i64, message: &str) -> VidGenError {
        let message = sanitize_error_message(message);
        match code {
            401 | 403 => VidGenError::Auth(message),
            429 => VidGenError::RateLimited { retry_after: None },
            _ => VidGenError::Api {
                status: u16::try_from(code).unwrap_or(0),
                message,
            },
        }
    }

    /// Submit the task and return its id.
    async fn submit(&self, body: &PiApiTaskRequest) -> Result<String> {
        let url = format!("{}/task", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
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

        let submit_response: PiApiResponse = response.json().await?;

        if submit_response.code != PIAPI_OK {
            return Err(Self::map_body_error(
                submit_response.code,
                &submit_response.message,
            ));
        }

        submit_response
            .data
            .and_then(|d| d.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VidGenError::UnexpectedResponse("No task_id in PiAPI response".into()))
    }

    /// Poll until the task completes.
    ///
    /// Transient poll failures are logged and polling carries on; only
    /// authentication failures, a failed task or the timeout stop it.
    async fn poll_until_ready(&self, task_id: &str) -> Result<CompletedTask> {
        let url = format!("{}/task/{}", self.base_url, task_id);
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
                .header("x-api-key", &self.api_key)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let headers = response.headers().clone();
                let text = response.text().await.unwrap_or_default();
                let err = classify_http_error(status.as_u16(), &text, &headers);
                if matches!(err, VidGenError::Auth(_)) {
                    return Err(err);
                }
                tracing::warn!(task_id = %task_id, attempt = attempts, "status check failed: {err}");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let poll_response: PiApiResponse = response.json().await?;
            if poll_response.code != PIAPI_OK {
                let err = Self::map_body_error(poll_response.code, &poll_response.message);
                if matches!(err, VidGenError::Auth(_)) {
                    return Err(err);
                }
                tracing::warn!(task_id = %task_id, attempt = attempts, "status check error: {err}");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let task = poll_response.data.ok_or_else(|| {
                VidGenError::UnexpectedResponse("No data in PiAPI poll response".into())
            })?;

            match task.status.to_lowercase().as_str() {
                "completed" => {
                    let video_url = task
                        .output
                        .and_then(|o| o.video_url)
                        .filter(|u| !u.is_empty())
                        .ok_or_else(|| {
                            VidGenError::UnexpectedResponse(
                                "Kling task completed but no video_url".into(),
                            )
                        })?;
                    return Ok(CompletedTask {
                        video_url,
                        poll_attempts: attempts,
                    });
                }
                "failed" => {
                    let error = task.error.unwrap_or_default();
                    tracing::error!(
                        task_id = %task_id,
                        code = ?error.code,
                        raw_message = error.raw_message.as_deref().unwrap_or("none"),
                        detail = error.detail.as_deref().unwrap_or("none"),
                        "Kling task failed"
                    );
                    for (i, log) in task.logs.iter().enumerate() {
                        tracing::debug!(task_id = %task_id, "task log {}: {}", i + 1, log);
                    }
                    let code = error
                        .code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown".into());
                    let message = error
                        .message
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "no error message".into());
                    return Err(VidGenError::VideoGeneration(format!(
                        "Kling task failed ({code}): {}",
                        sanitize_error_message(&message)
                    )));
                }
                other => {
                    let progress = latest_progress(&task.logs);
                    tracing::info!(
                        task_id = %task_id,
                        status = %other,
                        progress = %progress.as_deref().unwrap_or("unknown"),
                        elapsed_secs = start.elapsed().as_secs(),
                        "waiting for Kling generation"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
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

/// Returns the last `progress` value reported in the task logs.
fn latest_progress(logs: &[Value]) -> Option<String> {
    logs.iter()
        .filter_map(|log| log.get("progress"))
        .last()
        .map(|p| match p {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

#[async_trait]
impl VideoProvider for KlingVideoProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let body = self.build_body(request)?;
        let start = Instant::now();

        let task_id = self.submit(&body).await?;
        let submit_ms = start.elapsed().as_millis() as u64;
        tracing::info!(task_id = %task_id, "submitted Kling video generation task");

        let generation_start = Instant::now();
        let completed = self.poll_until_ready(&task_id).await?;
        let generation_ms = generation_start.elapsed().as_millis() as u64;
        tracing::info!(url = %completed.video_url, "Kling video generation complete");

        let data = self.download(&completed.video_url).await?;

        Ok(GeneratedVideo::new(
            data,
            "video/mp4",
            VideoProviderKind::Kling,
            VideoMetadata {
                model: Some(format!("kling-{}", self.model.as_str())),
                task_id: Some(task_id),
                duration_ms: Some(start.elapsed().as_millis() as u64),
                submit_ms: Some(submit_ms),
                generation_ms: Some(generation_ms),
                poll_attempts: Some(completed.poll_attempts),
                video_duration_secs: Some(body.input.duration),
                aspect_ratio: Some(body.input.aspect_ratio),
                source_url: Some(completed.video_url),
            },
        ))
    }

    fn kind(&self) -> VideoProviderKind {
        VideoProviderKind::Kling
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            Err(VidGenError::Auth("API key is empty".into()))
        } else {
            Ok(())
        }
    }
}

// Request types
#[derive(Debug, Serialize)]
struct PiApiTaskRequest {
    model: String,
    task_type: String,
    input: KlingTaskInput,
}

#[derive(Debug, Serialize)]
struct KlingTaskInput {
    prompt: String,
    negative_prompt: String,
    cfg_scale: f32,
    duration: u32,
    aspect_ratio: String,
    mode: String,
    version: String,
    image_url: String,
}

// Response types
#[derive(Debug, Deserialize)]
struct PiApiResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<PiApiTaskData>,
}

#[derive(Debug, Deserialize)]
struct PiApiTaskData {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Option<PiApiTaskOutput>,
    #[serde(default)]
    error: Option<PiApiTaskError>,
    #[serde(default)]
    logs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PiApiTaskOutput {
    #[serde(default)]
    video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PiApiTaskError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    raw_message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> KlingVideoProvider {
        KlingVideoProviderBuilder::new()
            .api_key("test-key")
            .build()
            .unwrap()
    }

    #[test]
    fn test_kling_video_model_as_str() {
        assert_eq!(KlingVideoModel::V1_0.as_str(), "1.0");
        assert_eq!(KlingVideoModel::V1_5.as_str(), "1.5");
        assert_eq!(KlingVideoModel::V1_6.as_str(), "1.6");
        assert_eq!(KlingVideoModel::V2_0.as_str(), "2.0");
        assert_eq!(KlingVideoModel::V2_1.as_str(), "2.1");
    }

    #[test]
    fn test_kling_video_defaults() {
        assert_eq!(KlingVideoModel::default(), KlingVideoModel::V2_0);
        assert_eq!(KlingVideoMode::default(), KlingVideoMode::Std);
    }

    #[test]
    fn test_kling_video_mode_as_str() {
        assert_eq!(KlingVideoMode::Std.as_str(), "std");
        assert_eq!(KlingVideoMode::Pro.as_str(), "pro");
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = KlingVideoProviderBuilder::new()
            .api_key("test-key")
            .model(KlingVideoModel::V1_6)
            .mode(KlingVideoMode::Pro)
            .build()
            .unwrap();
        assert_eq!(provider.model, KlingVideoModel::V1_6);
        assert_eq!(provider.mode, KlingVideoMode::Pro);
        assert_eq!(provider.base_url, BASE_URL);
    }

    #[test]
    fn test_builder_missing_key() {
        let saved = std::env::var("PIAPI_KEY").ok();
        std::env::remove_var("PIAPI_KEY");

        let result = KlingVideoProviderBuilder::new().build();
        assert!(result.is_err());
        let err = result.err().unwrap();
        assert!(err.to_string().contains("PIAPI_KEY"));

        if let Some(val) = saved {
            std::env::set_var("PIAPI_KEY", val);
        }
    }

    #[test]
    fn test_builder_default_timeouts() {
        let provider = provider();
        assert_eq!(provider.poll_interval, Duration::from_secs(5));
        assert_eq!(provider.timeout, Duration::from_secs(1800));
        assert_eq!(provider.cfg_scale, 0.5);
    }

    #[test]
    fn test_builder_trims_base_url() {
        let provider = KlingVideoProviderBuilder::new()
            .api_key("test-key")
            .base_url("http://localhost:1234/api/v1/")
            .build()
            .unwrap();
        assert_eq!(provider.base_url, "http://localhost:1234/api/v1");
    }

    #[test]
    fn test_request_body_serialization() {
        let req = VideoGenerationRequest::new("Animate this")
            .with_image_url("https://example.com/photo.jpg")
            .with_duration(10)
            .with_aspect_ratio("9:16")
            .with_negative_prompt("blurry");
        let body = provider().build_body(&req).unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            json!({
                "model": "kling",
                "task_type": "video_generation",
                "input": {
                    "prompt": "Animate this",
                    "negative_prompt": "blurry",
                    "cfg_scale": 0.5,
                    "duration": 10,
                    "aspect_ratio": "9:16",
                    "mode": "std",
                    "version": "2.0",
                    "image_url": "https://example.com/photo.jpg"
                }
            })
        );
    }

    #[test]
    fn test_request_body_defaults() {
        let req = VideoGenerationRequest::new("Animate this")
            .with_image_url("https://example.com/photo.jpg");
        let body = provider().build_body(&req).unwrap();
        assert_eq!(body.input.duration, 5);
        assert_eq!(body.input.aspect_ratio, "16:9");
        assert_eq!(body.input.negative_prompt, "");
    }

    #[test]
    fn test_request_rejects_local_file() {
        let file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        let req = VideoGenerationRequest::new("Animate this").with_image_file(file.path());
        let err = provider().build_body(&req).unwrap_err();
        assert!(matches!(err, VidGenError::InvalidRequest(_)));
        assert!(err.to_string().contains("URL"));
    }

    #[test]
    fn test_request_reports_missing_local_file() {
        let req = VideoGenerationRequest::new("Animate this").with_image_file("no/such/photo.jpg");
        let err = provider().build_body(&req).unwrap_err();
        assert!(matches!(err, VidGenError::InvalidRequest(_)));
        assert!(err.to_string().contains("does not exist"), "{err}");
    }

    #[test]
    fn test_builder_rejects_blank_key() {
        let result = KlingVideoProviderBuilder::new().api_key("").build();
        assert!(matches!(result, Err(VidGenError::Auth(_))));
    }

    #[test]
    fn test_request_requires_image() {
        let req = VideoGenerationRequest::new("Animate this");
        assert!(matches!(
            provider().build_body(&req),
            Err(VidGenError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_rejects_unsupported_duration() {
        let req = VideoGenerationRequest::new("Animate this")
            .with_image_url("https://example.com/photo.jpg")
            .with_duration(7);
        assert!(matches!(
            provider().build_body(&req),
            Err(VidGenError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_rejects_unsupported_aspect_ratio() {
        let req = VideoGenerationRequest::new("Animate this")
            .with_image_url("https://example.com/photo.jpg")
            .with_aspect_ratio("4:3");
        assert!(matches!(
            provider().build_body(&req),
            Err(VidGenError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_submit_response_deserialization() {
        let json = r#"{"code": 200, "message": "success", "data": {"task_id": "abc-123", "status": "pending"}}"#;
        let resp: PiApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.code, 200);
        assert_eq!(resp.data.unwrap().task_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_poll_response_completed() {
        let json = r#"{
            "code": 200,
            "message": "success",
            "data": {
                "task_id": "abc-123",
                "status": "Completed",
                "output": {"video_url": "https://cdn.example.com/v.mp4"}
            }
        }"#;
        let resp: PiApiResponse = serde_json::from_str(json).unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.status, "Completed");
        assert_eq!(
            data.output.unwrap().video_url.as_deref(),
            Some("https://cdn.example.com/v.mp4")
        );
    }

    #[test]
    fn test_poll_response_failed() {
        let json = r#"{
            "code": 200,
            "message": "success",
            "data": {
                "status": "failed",
                "error": {"code": 10000, "message": "task failed", "raw_message": "nsfw", "detail": null}
            }
        }"#;
        let resp: PiApiResponse = serde_json::from_str(json).unwrap();
        let error = resp.data.unwrap().error.unwrap();
        assert_eq!(error.code, Some(10000));
        assert_eq!(error.message.as_deref(), Some("task failed"));
        assert_eq!(error.raw_message.as_deref(), Some("nsfw"));
        assert!(error.detail.is_none());
    }

    #[test]
    fn test_latest_progress() {
        let logs = vec![
            json!({"message": "queued"}),
            json!({"progress": "20%"}),
            json!({"progress": 55}),
        ];
        assert_eq!(latest_progress(&logs).as_deref(), Some("55"));
        assert_eq!(latest_progress(&[]), None);
    }

    #[test]
    fn test_map_body_error() {
        assert!(matches!(
            KlingVideoProvider::map_body_error(401, "bad key"),
            VidGenError::Auth(_)
        ));
        assert!(matches!(
            KlingVideoProvider::map_body_error(429, "slow down"),
            VidGenError::RateLimited { .. }
        ));
        assert!(matches!(
            KlingVideoProvider::map_body_error(500, "oops"),
            VidGenError::Api { status: 500, .. }
        ));
        assert!(matches!(
            KlingVideoProvider::map_body_error(-1, "weird"),
            VidGenError::Api { status: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(provider().health_check().await.is_ok());

        let blank = KlingVideoProvider {
            api_key: "  ".into(),
            ..provider()
        };
        assert!(blank.health_check().await.is_err());
    }
}
