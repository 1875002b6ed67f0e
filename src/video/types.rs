//! Core types for video generation.

use crate::error::{Result, VidGenError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Video provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoProviderKind {
    /// Kling through PiAPI.
    Kling,
    /// MiniMax Hailuo.
    MiniMax,
    /// RunwayML Gen-2.
    Runway,
}

impl std::fmt::Display for VideoProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kling => write!(f, "kling"),
            Self::MiniMax => write!(f, "minimax"),
            Self::Runway => write!(f, "runway"),
        }
    }
}

/// Where the input image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// An image already hosted somewhere the vendor can fetch it.
    Url(String),
    /// A local image file.
    File(PathBuf),
}

impl ImageSource {
    /// Interprets `value` as a URL if it has an http(s) scheme, otherwise as a path.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::File(PathBuf::from(value))
        }
    }

    /// Returns the URL, or the file encoded as a `data:` URL.
    pub fn data_url(&self) -> Result<String> {
        match self {
            Self::Url(url) => Ok(url.clone()),
            Self::File(path) => Ok(format!(
                "data:{};base64,{}",
                image_mime_type(path),
                self.base64()?
            )),
        }
    }

    /// Returns the raw base64 encoding of a local file.
    ///
    /// Fails for URLs; callers that need inline bytes require a local image.
    pub fn base64(&self) -> Result<String> {
        use base64::Engine;

        match self {
            Self::Url(url) => Err(VidGenError::InvalidRequest(format!(
                "a local image file is required, got URL '{url}'"
            ))),
            Self::File(path) => {
                let data = read_image(path)?;
                Ok(base64::engine::general_purpose::STANDARD.encode(data))
            }
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fails with `InvalidRequest` unless `path` is an existing file.
pub(crate) fn ensure_image_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(VidGenError::InvalidRequest(format!(
            "input image '{}' does not exist",
            path.display()
        )))
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    ensure_image_exists(path)?;
    Ok(std::fs::read(path)?)
}

fn image_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Metadata about the video generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Vendor-issued job id.
    pub task_id: Option<String>,
    /// Total wall time in milliseconds (submit, polling and download).
    pub duration_ms: Option<u64>,
    /// Time spent on the create-job request in milliseconds.
    pub submit_ms: Option<u64>,
    /// Time from submission until the job reached a terminal state.
    pub generation_ms: Option<u64>,
    /// Number of status polls issued.
    pub poll_attempts: Option<u32>,
    /// Video duration in seconds.
    pub video_duration_secs: Option<u32>,
    /// Aspect ratio requested.
    pub aspect_ratio: Option<String>,
    /// URL the video was downloaded from.
    pub source_url: Option<String>,
}

/// A request to generate a video from an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoGenerationRequest {
    /// The text prompt guiding the generation.
    pub prompt: String,
    /// Input image.
    pub image: Option<ImageSource>,
    /// What the video should avoid.
    pub negative_prompt: Option<String>,
    /// Desired video duration in seconds.
    pub duration_secs: Option<u32>,
    /// Aspect ratio (e.g., "16:9", "9:16").
    pub aspect_ratio: Option<String>,
}

impl VideoGenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            negative_prompt: None,
            duration_secs: None,
            aspect_ratio: None,
        }
    }

    /// Sets the input image.
    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }

    /// Sets a hosted input image.
    pub fn with_image_url(self, url: impl Into<String>) -> Self {
        self.with_image(ImageSource::Url(url.into()))
    }

    /// Sets a local input image.
    pub fn with_image_file(self, path: impl Into<PathBuf>) -> Self {
        self.with_image(ImageSource::File(path.into()))
    }

    /// Sets the negative prompt.
    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    /// Sets the desired video duration in seconds.
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    pub(crate) fn require_image(&self, vendor: &str) -> Result<&ImageSource> {
        self.image.as_ref().ok_or_else(|| {
            VidGenError::InvalidRequest(format!("{vendor} requires an input image"))
        })
    }
}

/// A generated video with its data and metadata.
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    /// Raw video bytes.
    pub data: Vec<u8>,
    /// MIME type (e.g., "video/mp4").
    pub mime_type: String,
    /// Provider that generated this video.
    pub provider: VideoProviderKind,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

impl GeneratedVideo {
    /// Creates a new generated video.
    pub fn new(
        data: Vec<u8>,
        mime_type: impl Into<String>,
        provider: VideoProviderKind,
        metadata: VideoMetadata,
    ) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            provider,
            metadata,
        }
    }

    /// Returns the size of the video data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the video to the specified path, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(VideoProviderKind::Kling.to_string(), "kling");
        assert_eq!(VideoProviderKind::MiniMax.to_string(), "minimax");
        assert_eq!(VideoProviderKind::Runway.to_string(), "runway");
    }

    #[test]
    fn test_image_source_parse() {
        assert_eq!(
            ImageSource::parse("https://example.com/cat.jpg"),
            ImageSource::Url("https://example.com/cat.jpg".into())
        );
        assert_eq!(
            ImageSource::parse("images/cat.jpg"),
            ImageSource::File(PathBuf::from("images/cat.jpg"))
        );
    }

    #[test]
    fn test_url_passes_through_data_url() {
        let src = ImageSource::Url("https://example.com/cat.jpg".into());
        assert_eq!(src.data_url().unwrap(), "https://example.com/cat.jpg");
        assert!(matches!(src.base64(), Err(VidGenError::InvalidRequest(_))));
    }

    #[test]
    fn test_file_encodes_as_data_url() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"hello").unwrap();

        let src = ImageSource::File(file.path().to_path_buf());
        assert_eq!(src.base64().unwrap(), "aGVsbG8=");
        assert_eq!(src.data_url().unwrap(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_unknown_extension_defaults_to_jpeg() {
        assert_eq!(image_mime_type(Path::new("photo.JPG")), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("photo")), "image/jpeg");
        assert_eq!(image_mime_type(Path::new("photo.WEBP")), "image/webp");
    }

    #[test]
    fn test_missing_file_is_invalid_request() {
        let src = ImageSource::File(PathBuf::from("/definitely/not/here.jpg"));
        let err = src.data_url().unwrap_err();
        assert!(matches!(err, VidGenError::InvalidRequest(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_request_builder() {
        let req = VideoGenerationRequest::new("A cat")
            .with_image_url("https://example.com/cat.jpg")
            .with_negative_prompt("blur")
            .with_duration(10)
            .with_aspect_ratio("9:16");
        assert_eq!(req.prompt, "A cat");
        assert_eq!(
            req.image,
            Some(ImageSource::Url("https://example.com/cat.jpg".into()))
        );
        assert_eq!(req.negative_prompt.as_deref(), Some("blur"));
        assert_eq!(req.duration_secs, Some(10));
        assert_eq!(req.aspect_ratio.as_deref(), Some("9:16"));
    }

    #[test]
    fn test_require_image() {
        let req = VideoGenerationRequest::new("A cat");
        let err = req.require_image("Runway").unwrap_err();
        assert_eq!(err.to_string(), "invalid request: Runway requires an input image");
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.mp4");
        let video = GeneratedVideo::new(
            vec![1, 2, 3],
            "video/mp4",
            VideoProviderKind::Runway,
            VideoMetadata::default(),
        );
        video.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(video.size(), 3);
    }
}
