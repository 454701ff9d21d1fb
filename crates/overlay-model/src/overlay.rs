//! Overlay definitions.
//!
//! An [`Overlay`] is either text or an image, placed at a named anchor.
//! Definitions are validated once at construction; the pixel offsets are
//! always recomputed from the anchor so they can never drift from it.

use std::path::{Path, PathBuf};

use overlaycast_common::error::{OverlaycastError, OverlaycastResult};
use serde::{Deserialize, Serialize};

use crate::position::{OverlayKind, Position};

/// Longest text line stored for a text overlay, in characters.
pub const MAX_LINE_CHARS: usize = 6;

/// File extensions accepted for image overlays.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// A live overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    id: String,
    position: Position,
    x: i32,
    y: i32,
    #[serde(flatten)]
    content: OverlayContent,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayContent {
    /// Text drawn line by line.
    Text {
        /// Lines of at most [`MAX_LINE_CHARS`] characters.
        lines: Vec<String>,
    },

    /// An image file scaled to a fixed square.
    Image {
        /// Location of the decodable image.
        path: PathBuf,
    },
}

/// Client input for creating an overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySpec {
    #[serde(rename = "type")]
    pub kind: OverlayKind,

    /// Text to display, or the image path.
    pub content: String,

    /// Anchor name; unknown or missing names mean center.
    #[serde(default)]
    pub position: Option<String>,
}

/// Client input for updating an overlay. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPatch {
    #[serde(rename = "type", default)]
    pub kind: Option<OverlayKind>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub position: Option<String>,
}

impl OverlaySpec {
    pub fn text(content: impl Into<String>, position: Option<&str>) -> Self {
        Self {
            kind: OverlayKind::Text,
            content: content.into(),
            position: position.map(str::to_string),
        }
    }

    pub fn image(path: impl Into<String>, position: Option<&str>) -> Self {
        Self {
            kind: OverlayKind::Image,
            content: path.into(),
            position: position.map(str::to_string),
        }
    }
}

impl Overlay {
    /// Validate `spec` and build an overlay with the given identifier.
    pub fn from_spec(id: impl Into<String>, spec: &OverlaySpec) -> OverlaycastResult<Self> {
        let content = OverlayContent::parse(spec.kind, &spec.content)?;
        let position = Position::parse_or_center(spec.position.as_deref());
        Ok(Self::assemble(id.into(), position, content))
    }

    /// Build the overlay that results from applying `patch`.
    ///
    /// `self` is left untouched; a rejected patch changes nothing.
    pub fn patched(&self, patch: &OverlayPatch) -> OverlaycastResult<Self> {
        let kind = patch.kind.unwrap_or_else(|| self.kind());

        let content = match patch.content.as_deref() {
            Some(raw) => OverlayContent::parse(kind, raw)?,
            None if kind == self.kind() => self.content.clone(),
            None => {
                return Err(OverlaycastError::invalid_definition(format!(
                    "changing an overlay to {kind} requires new content"
                )))
            }
        };

        let position = match patch.position.as_deref() {
            Some(name) => Position::parse_or_center(Some(name)),
            None => self.position,
        };

        Ok(Self::assemble(self.id.clone(), position, content))
    }

    fn assemble(id: String, position: Position, content: OverlayContent) -> Self {
        let (x, y) = position.anchor(content.kind());
        Self {
            id,
            position,
            x,
            y,
            content,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OverlayKind {
        self.content.kind()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Top-left pixel offset derived from the anchor.
    pub fn coordinates(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn content(&self) -> &OverlayContent {
        &self.content
    }

    /// Text lines, for text overlays.
    pub fn text_lines(&self) -> Option<&[String]> {
        match &self.content {
            OverlayContent::Text { lines } => Some(lines),
            OverlayContent::Image { .. } => None,
        }
    }

    /// Image location, for image overlays.
    pub fn image_path(&self) -> Option<&Path> {
        match &self.content {
            OverlayContent::Image { path } => Some(path),
            OverlayContent::Text { .. } => None,
        }
    }
}

impl OverlayContent {
    /// Validate raw client content for the given kind.
    pub fn parse(kind: OverlayKind, raw: &str) -> OverlaycastResult<Self> {
        match kind {
            OverlayKind::Text => {
                if raw.trim().is_empty() {
                    return Err(OverlaycastError::invalid_definition(
                        "text overlay content is empty",
                    ));
                }
                Ok(Self::Text {
                    lines: wrap_text(raw, MAX_LINE_CHARS),
                })
            }
            OverlayKind::Image => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(OverlaycastError::invalid_definition(
                        "image overlay path is empty",
                    ));
                }
                let path = PathBuf::from(raw);
                if !has_allowed_image_extension(&path) {
                    return Err(OverlaycastError::invalid_definition(format!(
                        "unsupported image type for '{raw}' (expected one of {})",
                        ALLOWED_IMAGE_EXTENSIONS.join(", ")
                    )));
                }
                Ok(Self::Image { path })
            }
        }
    }

    pub fn kind(&self) -> OverlayKind {
        match self {
            Self::Text { .. } => OverlayKind::Text,
            Self::Image { .. } => OverlayKind::Image,
        }
    }
}

/// Split `text` into consecutive chunks of at most `max_chars` characters.
///
/// Text that already fits is returned as a single line. Chunking counts
/// characters, so multi-byte text is never split inside a code point.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn has_allowed_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
