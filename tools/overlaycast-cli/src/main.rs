//! Overlaycast CLI: re-stream an RTSP camera with text and image overlays.
//!
//! Usage:
//!   overlaycast run <URL> --output FILE [--text T[@POS]]... [--image P[@POS]]...
//!   overlaycast render (--text T | --image P) --output FILE.png
//!   overlaycast validate-url <URL>
//!   overlaycast check

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use overlaycast_common::config::AppConfig;
use overlaycast_common::error::OverlaycastError;

mod commands;

#[derive(Parser)]
#[command(
    name = "overlaycast",
    about = "Re-stream RTSP video with live text and image overlays",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a source with overlays into a multipart MJPEG file
    Run {
        /// RTSP URL of the source camera
        url: String,

        /// Text overlay, optionally suffixed with @top|bottom|left|right|center
        #[arg(long = "text", value_name = "TEXT[@POSITION]")]
        texts: Vec<String>,

        /// Image overlay (png/jpg/jpeg/gif), optionally suffixed with @POSITION
        #[arg(long = "image", value_name = "PATH[@POSITION]")]
        images: Vec<String>,

        /// Where to write the multipart stream
        #[arg(short, long)]
        output: PathBuf,

        /// Stop after this many frames (default: until Ctrl+C)
        #[arg(long)]
        frames: Option<u64>,

        /// Use a synthetic test pattern instead of connecting to the URL
        #[arg(long)]
        synthetic: bool,
    },

    /// Render a single overlay bitmap to a PNG
    Render {
        /// Text content
        #[arg(long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<String>,

        /// Image file
        #[arg(long)]
        image: Option<String>,

        /// Anchor position (unknown names fall back to center)
        #[arg(long)]
        position: Option<String>,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check a URL against the accepted RTSP grammar
    ValidateUrl {
        url: String,
    },

    /// Check GStreamer, fonts, and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(OverlaycastError::config(format!(
                "config file {} does not exist",
                path.display()
            ))
            .into());
        }
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    overlaycast_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Run {
            url,
            texts,
            images,
            output,
            frames,
            synthetic,
        } => {
            commands::run::run(&config, url, texts, images, output, frames, synthetic).await
        }
        Commands::Render {
            text,
            image,
            position,
            output,
        } => commands::render::run(&config, text, image, position, output),
        Commands::ValidateUrl { url } => commands::validate_url::run(&url),
        Commands::Check => commands::check::run(&config, cli.config.as_deref()),
    }
}
