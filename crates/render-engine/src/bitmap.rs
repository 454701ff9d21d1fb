//! Raster types passed between the renderer, cache, and compositor.

use std::path::Path;

use image::{ImageResult, RgbImage, RgbaImage};

/// A raw or composited video frame: 8-bit RGB, row-major, no padding.
pub type Frame = RgbImage;

/// A rasterized overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum Bitmap {
    /// Bitmap with per-pixel coverage; alpha blended onto the frame.
    Rgba(RgbaImage),
    /// Opaque bitmap; copied over the frame as-is.
    Rgb(RgbImage),
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        match self {
            Self::Rgba(img) => img.width(),
            Self::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Rgba(img) => img.height(),
            Self::Rgb(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba(_))
    }

    /// Write the bitmap to `path`; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        match self {
            Self::Rgba(img) => img.save(path),
            Self::Rgb(img) => img.save(path),
        }
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(img: RgbaImage) -> Self {
        Self::Rgba(img)
    }
}

impl From<RgbImage> for Bitmap {
    fn from(img: RgbImage) -> Self {
        Self::Rgb(img)
    }
}
