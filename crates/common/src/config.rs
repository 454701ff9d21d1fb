//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::OverlaycastError;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Stream session settings.
    pub stream: StreamDefaults,

    /// Overlay rendering settings.
    pub overlays: OverlayDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Frame loop and capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDefaults {
    /// JPEG quality for published frames (1-100).
    pub jpeg_quality: u8,

    /// Sleep between pause-flag checks while paused (ms).
    pub pause_poll_ms: u64,

    /// Overlay cache rebuild interval (ms). Values below 1000 are raised.
    pub overlay_refresh_ms: u64,

    /// How long to wait for the source to start playing (s).
    pub open_timeout_secs: u64,

    /// Scale source frames to the fixed 720x480 overlay canvas.
    pub scale_to_canvas: bool,
}

/// Overlay rasterization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayDefaults {
    /// TrueType fonts tried in order for text overlays.
    pub font_candidates: Vec<PathBuf>,

    /// Text size in pixels.
    pub font_size_px: f32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "overlaycast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            pause_poll_ms: 100,
            overlay_refresh_ms: 1000,
            open_timeout_secs: 10,
            scale_to_canvas: true,
        }
    }
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            font_candidates: default_font_candidates(),
            font_size_px: 32.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    ///
    /// A missing file is normal; an unreadable or malformed one is logged
    /// and ignored.
    pub fn load_from(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(config_path)
            .map_err(OverlaycastError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(OverlaycastError::from));
        parsed.unwrap_or_else(|e| {
            tracing::warn!(path = %config_path.display(), error = %e, "Ignoring config file");
            Self::default()
        })
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("overlaycast").join("config.json")
}

/// Platform font locations, most specific first.
fn default_font_candidates() -> Vec<PathBuf> {
    [
        "/System/Library/Fonts/Helvetica.ttc",
        "arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}
