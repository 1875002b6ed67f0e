//! Video generation providers, one per vendor API.

#[cfg(feature = "kling-video")]
mod kling;
#[cfg(feature = "kling-video")]
pub use kling::{KlingVideoMode, KlingVideoModel, KlingVideoProvider, KlingVideoProviderBuilder};

#[cfg(feature = "minimax-video")]
mod minimax;
#[cfg(feature = "minimax-video")]
pub use minimax::{MiniMaxVideoModel, MiniMaxVideoProvider, MiniMaxVideoProviderBuilder};

#[cfg(feature = "runway-video")]
mod runway;
#[cfg(feature = "runway-video")]
pub use runway::{RunwayVideoProvider, RunwayVideoProviderBuilder};
