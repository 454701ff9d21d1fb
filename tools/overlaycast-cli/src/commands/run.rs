//! Run a stream session and write its multipart output to a file.

use std::path::PathBuf;

use anyhow::Context;
use overlaycast_common::config::AppConfig;
use overlaycast_common::error::ErrorKind;
use overlaycast_render_engine::OverlayRenderer;
use overlaycast_stream_engine::{
    multipart_content_type, redact_credentials, GstSourceOpener, PatternSourceOpener,
    StreamConfig, StreamController,
};
use tokio::io::AsyncWriteExt;

use super::overlay_specs;

pub async fn run(
    config: &AppConfig,
    url: String,
    texts: Vec<String>,
    images: Vec<String>,
    output: PathBuf,
    frames: Option<u64>,
    synthetic: bool,
) -> anyhow::Result<()> {
    let stream_config = StreamConfig::from_defaults(&config.stream);
    let renderer = OverlayRenderer::from_config(&config.overlays);
    tracing::info!(font = %renderer.font(), "Overlay font resolved");

    let controller = if synthetic {
        StreamController::new(PatternSourceOpener::default(), renderer, stream_config)
    } else {
        StreamController::new(GstSourceOpener::from_config(&config.stream), renderer, stream_config)
    };

    for spec in overlay_specs(&texts, &images) {
        let overlay = controller
            .create_overlay(&spec)
            .with_context(|| format!("Invalid overlay '{}'", spec.content))?;
        let (x, y) = overlay.coordinates();
        println!(
            "  Overlay {} ({} @ {}, {x},{y})",
            overlay.id(),
            overlay.kind(),
            overlay.position()
        );
    }

    println!("Streaming {}", redact_credentials(&url));
    println!("  Output: {} ({})", output.display(), multipart_content_type());
    if let Some(limit) = frames {
        println!("  Frames: {limit}");
    } else {
        println!("Press Ctrl+C to stop...");
    }
    println!();

    let mut file = tokio::fs::File::create(&output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;
    // Opening a source can block for the whole open timeout.
    let starter = controller.clone();
    let started = tokio::task::spawn_blocking(move || starter.start(&url))
        .await
        .context("Stream start task failed")?;
    if let Err(e) = started {
        if e.kind() == ErrorKind::CaptureFailure {
            eprintln!("Could not open the source. Check that the camera is reachable, or try --synthetic.");
        }
        return Err(e.into());
    }
    // Bound to the session just started; ends when it does.
    let mut reader = controller.stream_frames();

    let mut written: u64 = 0;
    loop {
        tokio::select! {
            chunk = reader.next() => match chunk {
                Some(chunk) => {
                    file.write_all(&chunk).await?;
                    written += 1;
                    if frames.is_some_and(|limit| written >= limit) {
                        break;
                    }
                }
                None => {
                    println!("Source ended.");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    controller.stop();
    file.flush().await?;

    let stats = controller.stats();
    println!("Wrote {written} frames to {}", output.display());
    println!(
        "  published: {}  dropped: {}  overlay rebuilds: {}",
        stats.frames_published, stats.frames_dropped, stats.cache_rebuilds
    );
    Ok(())
}
