//! Render a single overlay to a PNG for previewing.

use std::path::PathBuf;

use anyhow::Context;
use overlaycast_common::config::AppConfig;
use overlaycast_overlay_model::{Overlay, OverlaySpec};
use overlaycast_render_engine::OverlayRenderer;

pub fn run(
    config: &AppConfig,
    text: Option<String>,
    image: Option<String>,
    position: Option<String>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let spec = match (text, image) {
        (Some(text), _) => OverlaySpec::text(text, position.as_deref()),
        (None, Some(path)) => OverlaySpec::image(path, position.as_deref()),
        (None, None) => anyhow::bail!("Either --text or --image is required"),
    };

    let overlay = Overlay::from_spec("preview", &spec)?;
    let renderer = OverlayRenderer::from_config(&config.overlays);
    let bitmap = renderer.render(&overlay)?;
    bitmap
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let (x, y) = overlay.coordinates();
    let (w, h) = bitmap.dimensions();
    println!("Rendered {} overlay ({w}x{h}) to {}", overlay.kind(), output.display());
    println!("  Position: {} ({x}, {y})", overlay.position());
    println!("  Font: {}", renderer.font());
    println!("{}", serde_json::to_string_pretty(&overlay)?);
    Ok(())
}
