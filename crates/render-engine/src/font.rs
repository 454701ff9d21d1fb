//! Font selection for text overlays.
//!
//! A TrueType font is preferred; the candidates are tried in order and the
//! first that loads wins. When none loads, text is drawn with a built-in
//! 5x7 bitmap font so text overlays always render.

use std::fmt;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};

/// Colour of overlay text.
pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Each built-in glyph cell is drawn as a square of this many pixels.
const BUILTIN_PIXEL: u32 = 3;
const BUILTIN_COLUMNS: u32 = 5;
/// Blank columns between built-in glyphs.
const BUILTIN_SPACING: u32 = 1;

/// The font text overlays are drawn with.
pub enum TextFont {
    /// A TrueType/OpenType font loaded from disk.
    TrueType { font: Font<'static>, path: PathBuf },
    /// The embedded 5x7 bitmap font.
    Builtin,
}

impl TextFont {
    /// Load the first candidate that parses, else the built-in font.
    pub fn resolve(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            match load_truetype(path) {
                Some(font) => {
                    tracing::info!(font = %path.display(), "Using TrueType font for text overlays");
                    return Self::TrueType {
                        font,
                        path: path.clone(),
                    };
                }
                None => tracing::debug!(font = %path.display(), "Font candidate unavailable"),
            }
        }
        tracing::warn!("No TrueType font found; text overlays use the built-in bitmap font");
        Self::Builtin
    }

    pub fn builtin() -> Self {
        Self::Builtin
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin)
    }

    /// Draw one line of white text with its top-left corner at (`x`, `y`).
    ///
    /// Pixels falling outside `canvas` are dropped.
    pub fn draw_line(&self, canvas: &mut RgbaImage, x: i32, y: i32, text: &str, size_px: f32) {
        match self {
            Self::TrueType { font, .. } => draw_truetype_line(font, canvas, x, y, text, size_px),
            Self::Builtin => draw_builtin_line(canvas, x, y, text),
        }
    }
}

impl fmt::Debug for TextFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrueType { path, .. } => f
                .debug_struct("TrueType")
                .field("path", &path.display().to_string())
                .finish(),
            Self::Builtin => f.write_str("Builtin"),
        }
    }
}

impl fmt::Display for TextFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrueType { path, .. } => write!(f, "{}", path.display()),
            Self::Builtin => f.write_str("built-in 5x7"),
        }
    }
}

fn load_truetype(path: &Path) -> Option<Font<'static>> {
    let data = std::fs::read(path).ok()?;
    Font::try_from_vec(data)
}

fn draw_truetype_line(
    font: &Font<'static>,
    canvas: &mut RgbaImage,
    x: i32,
    y: i32,
    text: &str,
    size_px: f32,
) {
    let scale = Scale::uniform(size_px);
    let ascent = font.v_metrics(scale).ascent;
    let origin = point(x as f32, y as f32 + ascent);
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);

    for glyph in font.layout(text, scale, origin) {
        let Some(bounds) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = bounds.min.x + gx as i32;
            let py = bounds.min.y + gy as i32;
            if px < 0 || py < 0 || px >= width || py >= height {
                return;
            }
            let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            // Overlapping glyph edges keep the stronger coverage.
            if alpha > pixel[3] {
                *pixel = Rgba([TEXT_COLOR[0], TEXT_COLOR[1], TEXT_COLOR[2], alpha]);
            }
        });
    }
}

fn draw_builtin_line(canvas: &mut RgbaImage, x: i32, y: i32, text: &str) {
    let advance = ((BUILTIN_COLUMNS + BUILTIN_SPACING) * BUILTIN_PIXEL) as i32;
    let mut pen_x = x;
    for ch in text.chars() {
        for (row, bits) in builtin_glyph(ch).iter().enumerate() {
            for col in 0..BUILTIN_COLUMNS {
                if bits & (1 << (BUILTIN_COLUMNS - 1 - col)) == 0 {
                    continue;
                }
                let cell = Rect::at(
                    pen_x + (col * BUILTIN_PIXEL) as i32,
                    y + row as i32 * BUILTIN_PIXEL as i32,
                )
                .of_size(BUILTIN_PIXEL, BUILTIN_PIXEL);
                draw_filled_rect_mut(canvas, cell, TEXT_COLOR);
            }
        }
        pen_x += advance;
    }
}

/// Rows of a 5x7 glyph, top to bottom; bit 4 is the leftmost column.
fn builtin_glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '\'' => [0x0C, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00],
        // Anything else renders as a hollow box.
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}
