//! Video generation module.

pub mod output;
mod provider;
pub mod providers;
mod types;

pub use provider::VideoProvider;
pub use types::{
    GeneratedVideo, ImageSource, VideoGenerationRequest, VideoMetadata, VideoProviderKind,
};
