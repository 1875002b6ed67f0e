//! RunwayML Gen-2 video generation provider (image-to-video).
//!
//! Gen-2 answers synchronously with the video inlined as base64, so there is
//! no task to poll.

use crate::error::{classify_http_error, Result, VidGenError};
use crate::video::provider::VideoProvider;
use crate::video::types::{
    GeneratedVideo, VideoGenerationRequest, VideoMetadata, VideoProviderKind,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://api.runwayml.com/v1";

/// Builder for `RunwayVideoProvider`.
#[derive(Debug, Clone)]
pub struct RunwayVideoProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    num_frames: u32,
    fps: u32,
    timeout: Duration,
}

impl Default for RunwayVideoProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: BASE_URL.to_string(),
            num_frames: 24,
            fps: 8,
            timeout: Duration::from_secs(600),
        }
    }
}

impl RunwayVideoProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `RUNWAY_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the number of frames to generate.
    pub fn num_frames(mut self, num_frames: u32) -> Self {
        self.num_frames = num_frames;
        self
    }

    /// Sets the frame rate of the output video.
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Sets the HTTP timeout for the (blocking) generation request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<RunwayVideoProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("RUNWAY_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                VidGenError::Auth("RUNWAY_API_KEY not set and no API key provided".into())
            })?;

        if self.num_frames == 0 || self.fps == 0 {
            return Err(VidGenError::InvalidRequest(
                "num_frames and fps must be greater than zero".into(),
            ));
        }

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(RunwayVideoProvider {
            client,
            api_key,
            base_url: self.base_url,
            num_frames: self.num_frames,
            fps: self.fps,
        })
    }
}

/// RunwayML Gen-2 video generation provider.
#[derive(Debug)]
pub struct RunwayVideoProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    num_frames: u32,
    fps: u32,
}

impl RunwayVideoProvider {
    /// Creates a new `RunwayVideoProviderBuilder`.
    pub fn builder() -> RunwayVideoProviderBuilder {
        RunwayVideoProviderBuilder::new()
    }

    fn build_body(&self, request: &VideoGenerationRequest) -> Result<Gen2Request> {
        let image = request.require_image("Runway")?.base64()?;
        Ok(Gen2Request {
            prompt: request.prompt.clone(),
            image,
            mode: "image-to-video".to_string(),
            num_frames: self.num_frames,
            fps: self.fps,
        })
    }

    fn decode_video(response: Gen2Response) -> Result<Vec<u8>> {
        use base64::Engine;

        let encoded = response
            .video
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VidGenError::UnexpectedResponse("No video in Runway response".into()))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| VidGenError::Decode(format!("Runway video payload: {e}")))
    }
}

#[async_trait]
impl VideoProvider for RunwayVideoProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let body = self.build_body(request)?;
        let start = Instant::now();

        tracing::info!(
            num_frames = self.num_frames,
            fps = self.fps,
            "sending request to RunwayML Gen-2"
        );

        let response = self
            .client
            .post(format!("{}/inference/gen2", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &text, &headers));
        }

        let gen2_response: Gen2Response = response.json().await?;
        let data = Self::decode_video(gen2_response)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(elapsed_ms, bytes = data.len(), "Runway video generation complete");

        Ok(GeneratedVideo::new(
            data,
            "video/mp4",
            VideoProviderKind::Runway,
            VideoMetadata {
                model: Some("gen2".to_string()),
                duration_ms: Some(elapsed_ms),
                generation_ms: Some(elapsed_ms),
                video_duration_secs: Some(self.num_frames.div_ceil(self.fps)),
                ..Default::default()
            },
        ))
    }

    fn kind(&self) -> VideoProviderKind {
        VideoProviderKind::Runway
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            Err(VidGenError::Auth("API key is empty".into()))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct Gen2Request {
    prompt: String,
    image: String,
    mode: String,
    num_frames: u32,
    fps: u32,
}

#[derive(Debug, Deserialize)]
struct Gen2Response {
    #[serde(default)]
    video: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn provider() -> RunwayVideoProvider {
        RunwayVideoProviderBuilder::new()
            .api_key("rw-test-key")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let provider = provider();
        assert_eq!(provider.num_frames, 24);
        assert_eq!(provider.fps, 8);
        assert_eq!(provider.base_url, BASE_URL);
    }

    #[test]
    fn test_builder_missing_key() {
        let saved = std::env::var("RUNWAY_API_KEY").ok();
        std::env::remove_var("RUNWAY_API_KEY");

        let err = RunwayVideoProviderBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("RUNWAY_API_KEY"));

        if let Some(val) = saved {
            std::env::set_var("RUNWAY_API_KEY", val);
        }
    }

    #[test]
    fn test_builder_rejects_blank_key() {
        let result = RunwayVideoProviderBuilder::new().api_key(" \t").build();
        assert!(matches!(result, Err(VidGenError::Auth(_))));
    }

    #[test]
    fn test_builder_rejects_zero_fps() {
        let result = RunwayVideoProviderBuilder::new()
            .api_key("rw-test-key")
            .fps(0)
            .build();
        assert!(matches!(result, Err(VidGenError::InvalidRequest(_))));
    }

    #[test]
    fn test_request_body() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"img").unwrap();

        let provider = RunwayVideoProviderBuilder::new()
            .api_key("rw-test-key")
            .num_frames(48)
            .fps(12)
            .build()
            .unwrap();
        let req = VideoGenerationRequest::new("A sunrise").with_image_file(file.path());
        let json = serde_json::to_value(provider.build_body(&req).unwrap()).unwrap();

        assert_eq!(json["prompt"], "A sunrise");
        assert_eq!(json["image"], "aW1n");
        assert_eq!(json["mode"], "image-to-video");
        assert_eq!(json["num_frames"], 48);
        assert_eq!(json["fps"], 12);
    }

    #[test]
    fn test_request_rejects_url_image() {
        let req = VideoGenerationRequest::new("A sunrise")
            .with_image_url("https://example.com/sunrise.jpg");
        assert!(matches!(
            provider().build_body(&req),
            Err(VidGenError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_decode_video() {
        let resp: Gen2Response = serde_json::from_str(r#"{"video": "AAECAw=="}"#).unwrap();
        assert_eq!(
            RunwayVideoProvider::decode_video(resp).unwrap(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_decode_video_missing() {
        let resp: Gen2Response = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert!(matches!(
            RunwayVideoProvider::decode_video(resp),
            Err(VidGenError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_decode_video_invalid_base64() {
        let resp: Gen2Response = serde_json::from_str(r#"{"video": "not base64!"}"#).unwrap();
        assert!(matches!(
            RunwayVideoProvider::decode_video(resp),
            Err(VidGenError::Decode(_))
        ));
    }
}
