//! Check runtime prerequisites.

use std::path::Path;

use overlaycast_common::config::{config_file_path, AppConfig};
use overlaycast_render_engine::TextFont;
use overlaycast_stream_engine::gstreamer_version;

pub fn run(config: &AppConfig, config_override: Option<&Path>) -> anyhow::Result<()> {
    println!("Overlaycast System Check");
    println!("{}", "=".repeat(50));

    let gstreamer_ok = match gstreamer_version() {
        Ok(version) => {
            println!("[OK] {version}");
            true
        }
        Err(e) => {
            println!("[FAIL] GStreamer: {e}");
            false
        }
    };

    let font = TextFont::resolve(&config.overlays.font_candidates);
    if font.is_builtin() {
        println!("[WARN] No TrueType font found; using the built-in bitmap font");
        for candidate in &config.overlays.font_candidates {
            println!("     tried {}", candidate.display());
        }
    } else {
        println!("[OK] Font: {font}");
    }

    let path = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[INFO] Config: {} (not present, using defaults)", path.display());
    }
    println!(
        "     jpeg quality {}, overlay refresh {} ms, open timeout {} s",
        config.stream.jpeg_quality, config.stream.overlay_refresh_ms, config.stream.open_timeout_secs
    );

    println!();
    if gstreamer_ok {
        println!("Overlaycast is ready.");
    } else {
        println!("GStreamer is required for RTSP sources; only --synthetic runs will work.");
    }
    Ok(())
}
