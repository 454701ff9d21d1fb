//! Overlay rasterization.
//!
//! Text overlays become a transparent canvas the size of the overlay
//! coordinate space with the text drawn at the overlay's anchor; image
//! overlays become a fixed-size RGBA square.

use std::path::Path;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use overlaycast_common::config::OverlayDefaults;
use overlaycast_common::error::{OverlaycastError, OverlaycastResult};
use overlaycast_overlay_model::{Overlay, OverlayContent, CANVAS_HEIGHT, CANVAS_WIDTH};

use crate::bitmap::Bitmap;
use crate::font::TextFont;

/// Vertical distance between the tops of consecutive text lines.
pub const TEXT_LINE_ADVANCE: i32 = 40;

/// Side length image overlays are resized to.
pub const IMAGE_OVERLAY_SIZE: u32 = 100;

/// Default text size in pixels.
pub const DEFAULT_FONT_SIZE_PX: f32 = 32.0;

/// Rasterizes overlay definitions into bitmaps.
#[derive(Debug)]
pub struct OverlayRenderer {
    font: TextFont,
    font_size_px: f32,
}

impl OverlayRenderer {
    pub fn new(font: TextFont, font_size_px: f32) -> Self {
        Self { font, font_size_px }
    }

    /// Resolve the font from the configured candidates.
    pub fn from_config(config: &OverlayDefaults) -> Self {
        Self::new(
            TextFont::resolve(&config.font_candidates),
            config.font_size_px,
        )
    }

    /// Renderer using the built-in bitmap font regardless of installed fonts.
    pub fn with_builtin_font() -> Self {
        Self::new(TextFont::builtin(), DEFAULT_FONT_SIZE_PX)
    }

    pub fn font(&self) -> &TextFont {
        &self.font
    }

    /// Rasterize one overlay.
    ///
    /// Text never fails. Image overlays fail with a render error when the
    /// file cannot be read or decoded.
    pub fn render(&self, overlay: &Overlay) -> OverlaycastResult<Bitmap> {
        match overlay.content() {
            OverlayContent::Text { lines } => {
                Ok(Bitmap::Rgba(self.render_text(lines, overlay.coordinates())))
            }
            OverlayContent::Image { path } => Ok(Bitmap::Rgba(render_image(path)?)),
        }
    }

    fn render_text(&self, lines: &[String], (x, y): (i32, i32)) -> RgbaImage {
        let mut canvas =
            RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, Rgba([255, 255, 255, 0]));
        let mut line_y = y;
        for line in lines {
            self.font
                .draw_line(&mut canvas, x, line_y, line, self.font_size_px);
            line_y += TEXT_LINE_ADVANCE;
        }
        canvas
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::from_config(&OverlayDefaults::default())
    }
}

/// Decode `path` and scale it to the fixed overlay square.
///
/// Sources without an alpha channel come out fully opaque.
fn render_image(path: &Path) -> OverlaycastResult<RgbaImage> {
    let decoded = image::open(path).map_err(|e| {
        OverlaycastError::render(format!("failed to decode {}: {e}", path.display()))
    })?;
    Ok(decoded
        .resize_exact(IMAGE_OVERLAY_SIZE, IMAGE_OVERLAY_SIZE, FilterType::Triangle)
        .into_rgba8())
}
