//! Basic image-to-video example using Kling through PiAPI.
//!
//! Run with: `cargo run --example generate_video -- https://example.com/cat.jpg`
//!
//! Requires `PIAPI_KEY` environment variable.

use vidgen::video::output;
use vidgen::{KlingVideoMode, KlingVideoProvider, VideoGenerationRequest, VideoProvider};

#[tokio::main]
async fn main() -> vidgen::Result<()> {
    let image_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://picsum.photos/id/237/1024/576".to_string());

    let provider = KlingVideoProvider::builder()
        .mode(KlingVideoMode::Std)
        .build()?;

    let request = VideoGenerationRequest::new("The dog slowly turns its head toward the camera")
        .with_image_url(image_url)
        .with_duration(5)
        .with_aspect_ratio("16:9");

    println!("Generating video (this may take a few minutes)...");
    let video = provider.generate(&request).await?;

    let filename = output::unique_filename(
        "kling",
        &request.prompt,
        "demo",
        output::StemCharset::Unicode,
        &chrono::Local::now(),
    );
    video.save(&filename)?;
    println!(
        "Saved {filename}: {} bytes in {}",
        video.size(),
        video
            .metadata
            .duration_ms
            .map(|ms| output::format_elapsed(std::time::Duration::from_millis(ms)))
            .unwrap_or_default()
    );

    Ok(())
}
