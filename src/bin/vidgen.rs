//! CLI for vidgen - image-to-video generation via vendor APIs.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidgen::video::output::format_elapsed;
use vidgen::{GeneratedVideo, VideoProvider};

#[derive(Parser)]
#[command(name = "vidgen")]
#[command(about = "Generate videos from an image and a prompt via Kling (PiAPI), MiniMax Hailuo or RunwayML")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Stop waiting for the vendor after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video with Kling through PiAPI
    Kling(KlingArgs),

    /// Generate a video with MiniMax Hailuo
    Minimax(MiniMaxArgs),

    /// Generate a video with RunwayML Gen-2
    Runway(RunwayArgs),

    /// List available providers and whether their API keys are set
    Providers,
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["image", "image_url"])))]
struct KlingArgs {
    /// Path to a local image file (PiAPI needs a hosted image; prefer --image-url)
    #[arg(long)]
    image: Option<PathBuf>,

    /// URL of an already hosted image
    #[arg(long, alias = "image_url")]
    image_url: Option<String>,

    /// Text prompt to guide the video generation
    #[arg(long)]
    prompt: String,

    /// Directory to save the output video
    #[arg(long, alias = "output_dir", default_value = "outputs")]
    output_dir: PathBuf,

    /// PiAPI API key (or set PIAPI_KEY)
    #[arg(long, alias = "api_key")]
    api_key: Option<String>,

    /// Kling model version
    #[arg(long, value_enum, default_value = "2.0")]
    model: KlingModelArg,

    /// Generation mode
    #[arg(long, value_enum, default_value = "std")]
    mode: KlingModeArg,

    /// Video duration in seconds
    #[arg(long, value_enum, default_value = "5")]
    duration: DurationArg,

    /// Negative prompt to guide the video generation
    #[arg(long, alias = "negative_prompt", default_value = "")]
    negative_prompt: String,

    /// Aspect ratio of the generated video
    #[arg(long, alias = "aspect_ratio", value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,
}

#[derive(Args)]
struct MiniMaxArgs {
    /// Path to the input image (or an http(s) URL)
    #[arg(long)]
    image: String,

    /// Text prompt to guide the video generation
    #[arg(long)]
    prompt: String,

    /// Path to save the output video (default: auto-generated under outputs/minMax/<model>/)
    #[arg(long)]
    output: Option<PathBuf>,

    /// MiniMax API key (or set MINIMAX_API_KEY)
    #[arg(long, alias = "api_key")]
    api_key: Option<String>,

    /// MiniMax model name (I2V-01-Director, I2V-01, I2V-01-live, MiniMax-Hailuo-02, ...)
    #[arg(long, default_value = "I2V-01-Director")]
    model: String,

    /// Polling interval in seconds
    #[arg(long, alias = "poll_interval", default_value_t = 10)]
    poll_interval: u64,
}

#[derive(Args)]
struct RunwayArgs {
    /// Path to the input image
    #[arg(long)]
    image: PathBuf,

    /// Text prompt to guide the video generation
    #[arg(long)]
    prompt: String,

    /// Path to save the output video
    #[arg(long)]
    output: PathBuf,

    /// RunwayML API key (or set RUNWAY_API_KEY)
    #[arg(long, alias = "api_key")]
    api_key: Option<String>,

    /// Number of frames to generate
    #[arg(long, alias = "num_frames", default_value_t = 24)]
    num_frames: u32,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 8)]
    fps: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KlingModelArg {
    #[value(name = "1.0")]
    V1_0,
    #[value(name = "1.5")]
    V1_5,
    #[value(name = "1.6")]
    V1_6,
    #[value(name = "2.0")]
    V2_0,
    #[value(name = "2.1")]
    V2_1,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KlingModeArg {
    Std,
    Pro,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DurationArg {
    #[value(name = "5")]
    Five,
    #[value(name = "10")]
    Ten,
}

impl DurationArg {
    fn secs(self) -> u32 {
        match self {
            Self::Five => 5,
            Self::Ten => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "1:1")]
    Square,
}

impl AspectRatioArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Square => "1:1",
        }
    }
}

#[cfg(feature = "kling-video")]
impl From<KlingModelArg> for vidgen::KlingVideoModel {
    fn from(arg: KlingModelArg) -> Self {
        match arg {
            KlingModelArg::V1_0 => Self::V1_0,
            KlingModelArg::V1_5 => Self::V1_5,
            KlingModelArg::V1_6 => Self::V1_6,
            KlingModelArg::V2_0 => Self::V2_0,
            KlingModelArg::V2_1 => Self::V2_1,
        }
    }
}

#[cfg(feature = "kling-video")]
impl From<KlingModeArg> for vidgen::KlingVideoMode {
    fn from(arg: KlingModeArg) -> Self {
        match arg {
            KlingModeArg::Std => Self::Std,
            KlingModeArg::Pro => Self::Pro,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let timeout = cli.timeout.map(Duration::from_secs);

    match cli.command {
        Commands::Kling(args) => {
            #[cfg(feature = "kling-video")]
            {
                generate_kling(args, timeout, cli.json).await?;
            }
            #[cfg(not(feature = "kling-video"))]
            {
                let _ = (args, timeout);
                anyhow::bail!("Kling provider not enabled");
            }
        }
        Commands::Minimax(args) => {
            #[cfg(feature = "minimax-video")]
            {
                generate_minimax(args, timeout, cli.json).await?;
            }
            #[cfg(not(feature = "minimax-video"))]
            {
                let _ = (args, timeout);
                anyhow::bail!("MiniMax provider not enabled");
            }
        }
        Commands::Runway(args) => {
            #[cfg(feature = "runway-video")]
            {
                generate_runway(args, timeout, cli.json).await?;
            }
            #[cfg(not(feature = "runway-video"))]
            {
                let _ = (args, timeout);
                anyhow::bail!("Runway provider not enabled");
            }
        }
        Commands::Providers => {
            list_providers(cli.json).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "kling-video")]
async fn generate_kling(
    args: KlingArgs,
    timeout: Option<Duration>,
    json_output: bool,
) -> anyhow::Result<()> {
    use vidgen::video::output::{unique_filename, StemCharset};
    use vidgen::{ImageSource, KlingVideoProvider, VideoGenerationRequest};

    let model = vidgen::KlingVideoModel::from(args.model);
    let mode = vidgen::KlingVideoMode::from(args.mode);

    let filename = unique_filename(
        "kling",
        &args.prompt,
        &format!("{}_{}", model.as_str(), mode.as_str()),
        StemCharset::Unicode,
        &chrono::Local::now(),
    );
    let output_path = args.output_dir.join(filename);

    let mut builder = KlingVideoProvider::builder().model(model).mode(mode);
    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let provider = builder.build()?;

    let image = match (args.image_url, args.image) {
        (Some(url), _) => ImageSource::Url(url),
        (None, Some(path)) => ImageSource::File(path),
        (None, None) => anyhow::bail!("either --image or --image-url must be provided"),
    };

    tracing::info!(
        image = %image,
        prompt = %args.prompt,
        version = model.as_str(),
        mode = mode.as_str(),
        duration_secs = args.duration.secs(),
        aspect_ratio = args.aspect_ratio.as_str(),
        output = %output_path.display(),
        "sending request to PiAPI Kling"
    );

    let mut request = VideoGenerationRequest::new(&args.prompt)
        .with_image(image)
        .with_duration(args.duration.secs())
        .with_aspect_ratio(args.aspect_ratio.as_str());
    if !args.negative_prompt.is_empty() {
        request = request.with_negative_prompt(args.negative_prompt);
    }

    let video = provider.generate(&request).await?;
    video.save(&output_path)?;
    report(&video, &output_path, json_output)
}

#[cfg(feature = "minimax-video")]
async fn generate_minimax(
    args: MiniMaxArgs,
    timeout: Option<Duration>,
    json_output: bool,
) -> anyhow::Result<()> {
    use vidgen::video::output::{sanitize_model, unique_filename, StemCharset};
    use vidgen::{ImageSource, MiniMaxVideoProvider, VideoGenerationRequest};

    let model = vidgen::MiniMaxVideoModel::from(args.model.as_str());
    let image = ImageSource::parse(&args.image);

    let output_path = match args.output {
        Some(path) => path,
        None => {
            let safe_model = sanitize_model(model.as_str());
            let filename = unique_filename(
                "minimax",
                &args.prompt,
                &safe_model,
                StemCharset::Ascii,
                &chrono::Local::now(),
            );
            Path::new("outputs")
                .join("minMax")
                .join(&safe_model)
                .join(filename)
        }
    };

    let mut builder = MiniMaxVideoProvider::builder()
        .model(model.clone())
        .poll_interval(Duration::from_secs(args.poll_interval));
    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let provider = builder.build()?;

    tracing::info!(
        image = %image,
        prompt = %args.prompt,
        model = model.as_str(),
        output = %output_path.display(),
        poll_interval_secs = args.poll_interval,
        "submitting video generation task to MiniMax"
    );

    let request = VideoGenerationRequest::new(&args.prompt).with_image(image);
    let video = provider.generate(&request).await?;
    video.save(&output_path)?;
    report(&video, &output_path, json_output)
}

#[cfg(feature = "runway-video")]
async fn generate_runway(
    args: RunwayArgs,
    timeout: Option<Duration>,
    json_output: bool,
) -> anyhow::Result<()> {
    use vidgen::{RunwayVideoProvider, VideoGenerationRequest};

    let mut builder = RunwayVideoProvider::builder()
        .num_frames(args.num_frames)
        .fps(args.fps);
    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let provider = builder.build()?;

    tracing::info!(
        image = %args.image.display(),
        prompt = %args.prompt,
        output = %args.output.display(),
        "sending request to RunwayML Gen-2"
    );

    let request = VideoGenerationRequest::new(&args.prompt).with_image_file(args.image);
    let video = provider.generate(&request).await?;
    video.save(&args.output)?;
    report(&video, &args.output, json_output)
}

/// Prints the outcome of a generation.
#[allow(dead_code)]
fn report(video: &GeneratedVideo, output: &Path, json_output: bool) -> anyhow::Result<()> {
    let meta = &video.metadata;

    if json_output {
        let result = serde_json::json!({
            "type": "video",
            "success": true,
            "output": output.display().to_string(),
            "size_bytes": video.size(),
            "provider": video.provider.to_string(),
            "model": meta.model,
            "task_id": meta.task_id,
            "duration_ms": meta.duration_ms,
            "submit_ms": meta.submit_ms,
            "generation_ms": meta.generation_ms,
            "poll_attempts": meta.poll_attempts,
            "video_duration_secs": meta.video_duration_secs,
            "source_url": meta.source_url,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "Video saved to {} ({} bytes) via {}",
        output.display(),
        video.size(),
        video.provider
    );
    if let Some(total) = meta.duration_ms {
        println!(
            "Total process completed in {}",
            format_elapsed(Duration::from_millis(total))
        );
    }
    if let Some(submit) = meta.submit_ms {
        println!("  - API request time: {:.2} seconds", submit as f64 / 1000.0);
    }
    if let Some(generation) = meta.generation_ms {
        println!(
            "  - Generation time: {}",
            format_elapsed(Duration::from_millis(generation))
        );
        if let Some(polls) = meta.poll_attempts.filter(|p| *p > 0) {
            println!("  - Polling attempts: {}", polls);
            println!(
                "  - Average time per poll: {:.2} seconds",
                generation as f64 / 1000.0 / polls as f64
            );
        }
    }

    Ok(())
}

async fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: &'static str,
        env_var: &'static str,
        enabled: bool,
        configured: bool,
    }

    let providers = vec![
        ProviderInfo {
            name: "Kling (PiAPI)",
            kind: "kling",
            env_var: "PIAPI_KEY",
            enabled: cfg!(feature = "kling-video"),
            configured: kling_configured().await,
        },
        ProviderInfo {
            name: "MiniMax Hailuo",
            kind: "minimax",
            env_var: "MINIMAX_API_KEY",
            enabled: cfg!(feature = "minimax-video"),
            configured: minimax_configured().await,
        },
        ProviderInfo {
            name: "RunwayML Gen-2",
            kind: "runway",
            env_var: "RUNWAY_API_KEY",
            enabled: cfg!(feature = "runway-video"),
            configured: runway_configured().await,
        },
    ];

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.enabled { "✓" } else { "✗" };
            let key = if p.configured { "set" } else { "missing" };
            println!("  {} {} ({})", status, p.name, p.kind);
            println!("    API key: {} ({})", p.env_var, key);
        }
    }

    Ok(())
}

/// Returns true when the provider builds from the environment and passes its health check.
#[allow(dead_code)]
async fn is_configured<P: VideoProvider>(provider: vidgen::Result<P>) -> bool {
    match provider {
        Ok(provider) => provider.health_check().await.is_ok(),
        Err(_) => false,
    }
}

async fn kling_configured() -> bool {
    #[cfg(feature = "kling-video")]
    {
        is_configured(vidgen::KlingVideoProvider::builder().build()).await
    }
    #[cfg(not(feature = "kling-video"))]
    {
        false
    }
}

async fn minimax_configured() -> bool {
    #[cfg(feature = "minimax-video")]
    {
        is_configured(vidgen::MiniMaxVideoProvider::builder().build()).await
    }
    #[cfg(not(feature = "minimax-video"))]
    {
        false
    }
}

async fn runway_configured() -> bool {
    #[cfg(feature = "runway-video")]
    {
        is_configured(vidgen::RunwayVideoProvider::builder().build()).await
    }
    #[cfg(not(feature = "runway-video"))]
    {
        false
    }
}
