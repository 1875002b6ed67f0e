#![warn(missing_docs)]
//! vidgen - image-to-video generation against third-party vendor APIs.
//!
//! Each vendor is a thin wrapper over its HTTP API: submit a job with an
//! image and a prompt, poll until it finishes, download the video.
//!
//! # Quick Start
//!
//! ```no_run
//! use vidgen::{KlingVideoProvider, VideoGenerationRequest, VideoProvider};
//!
//! #[tokio::main]
//! async fn main() -> vidgen::Result<()> {
//!     let provider = KlingVideoProvider::builder().build()?;
//!     let request = VideoGenerationRequest::new("The cat turns its head and blinks")
//!         .with_image_url("https://example.com/cat.jpg")
//!         .with_duration(5);
//!     let video = provider.generate(&request).await?;
//!     video.save("cat.mp4")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `kling-video`: Kling through PiAPI (`PIAPI_KEY`)
//! - `minimax-video`: MiniMax Hailuo (`MINIMAX_API_KEY`)
//! - `runway-video`: RunwayML Gen-2 (`RUNWAY_API_KEY`)
//! - `video`: All of the above
//! - `cli`: The `vidgen` command-line tool

mod error;

#[cfg(any(
    feature = "video",
    feature = "kling-video",
    feature = "minimax-video",
    feature = "runway-video"
))]
pub mod video;

pub use error::{Result, VidGenError};

#[cfg(any(
    feature = "video",
    feature = "kling-video",
    feature = "minimax-video",
    feature = "runway-video"
))]
pub use video::{
    GeneratedVideo, ImageSource, VideoGenerationRequest, VideoMetadata, VideoProvider,
    VideoProviderKind,
};

#[cfg(feature = "kling-video")]
pub use video::providers::{
    KlingVideoMode, KlingVideoModel, KlingVideoProvider, KlingVideoProviderBuilder,
};

#[cfg(feature = "minimax-video")]
pub use video::providers::{MiniMaxVideoModel, MiniMaxVideoProvider, MiniMaxVideoProviderBuilder};

#[cfg(feature = "runway-video")]
pub use video::providers::{RunwayVideoProvider, RunwayVideoProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Result, VidGenError};

    #[cfg(any(
        feature = "video",
        feature = "kling-video",
        feature = "minimax-video",
        feature = "runway-video"
    ))]
    pub use crate::video::{GeneratedVideo, ImageSource, VideoGenerationRequest, VideoProvider};

    #[cfg(feature = "kling-video")]
    pub use crate::video::providers::KlingVideoProvider;

    #[cfg(feature = "minimax-video")]
    pub use crate::video::providers::MiniMaxVideoProvider;

    #[cfg(feature = "runway-video")]
    pub use crate::video::providers::RunwayVideoProvider;
}
