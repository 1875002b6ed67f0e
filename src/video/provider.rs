//! Video provider trait.

use crate::error::Result;
use crate::video::types::{GeneratedVideo, VideoGenerationRequest, VideoProviderKind};
use async_trait::async_trait;

/// Trait for image-to-video generation providers.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Submits the request, waits for the job to finish and downloads the video.
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo>;

    /// Returns the kind of this provider.
    fn kind(&self) -> VideoProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            VideoProviderKind::Kling => "Kling (PiAPI)",
            VideoProviderKind::MiniMax => "MiniMax Hailuo",
            VideoProviderKind::Runway => "RunwayML Gen-2",
        }
    }

    /// Checks that credentials are present. Does not touch the network.
    async fn health_check(&self) -> Result<()>;
}
