use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod annotate;
mod classifier;
mod classifiers;
mod config;
mod error;
mod recognition;
mod segmentation;
mod server;

#[derive(Parser, Debug)]
#[command(name = "letter-segmenter")]
#[command(about = "Segment hand-drawn words into letters and recognize them")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "SEGMENTER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SEGMENTER_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 10MB)
    #[arg(long, env = "SEGMENTER_MAX_FILE_SIZE", default_value = "10485760")]
    pub max_file_size: usize,

    /// Path to a local .rten letter model
    #[arg(long, env = "SEGMENTER_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// URL to download the letter model from when no local path is given
    #[arg(long, env = "SEGMENTER_MODEL_URL")]
    pub model_url: Option<String>,

    /// Font used to write predicted letters on annotated images
    #[arg(long, env = "SEGMENTER_LABEL_FONT")]
    pub label_font: Option<PathBuf>,

    /// Intensity at or below which a pixel counts as ink
    #[arg(long, env = "SEGMENTER_THRESHOLD", default_value = "127")]
    pub threshold: u8,

    /// Regions must be wider and taller than this many pixels
    #[arg(long, env = "SEGMENTER_MIN_SIZE", default_value = "20")]
    pub min_size: u32,

    /// Largest vertical gap bridged when merging letter fragments
    #[arg(long, env = "SEGMENTER_MAX_DISTANCE", default_value = "30")]
    pub max_distance: u32,

    /// White margin added around each squared letter
    #[arg(long, env = "SEGMENTER_BORDER", default_value = "15")]
    pub border: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);

    tracing::info!("Starting letter-segmenter v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
