//! Overlay anchors and the fixed coordinate table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width of the canvas overlay coordinates are derived for.
pub const CANVAS_WIDTH: u32 = 720;

/// Height of the canvas overlay coordinates are derived for.
pub const CANVAS_HEIGHT: u32 = 480;

/// The two overlay flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Text,
    Image,
}

impl OverlayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown overlay type '{other}'")),
        }
    }
}

/// Named anchor an overlay is placed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Bottom,
    Left,
    Right,
    #[default]
    Center,
}

impl Position {
    pub const ALL: [Position; 5] = [
        Position::Top,
        Position::Bottom,
        Position::Left,
        Position::Right,
        Position::Center,
    ];

    /// Resolve a client-supplied anchor name.
    ///
    /// Missing or unrecognized names fall back to [`Position::Center`].
    pub fn parse_or_center(name: Option<&str>) -> Self {
        name.and_then(|n| n.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        }
    }

    /// Top-left pixel offset for an overlay of `kind` at this anchor.
    pub fn anchor(self, kind: OverlayKind) -> (i32, i32) {
        match (kind, self) {
            (OverlayKind::Text, Self::Top) => (300, 100),
            (OverlayKind::Text, Self::Bottom) => (300, 400),
            (OverlayKind::Text, Self::Left) => (50, 250),
            (OverlayKind::Text, Self::Right) => (580, 250),
            (OverlayKind::Text, Self::Center) => (300, 250),
            (OverlayKind::Image, Self::Top) => (300, 50),
            (OverlayKind::Image, Self::Bottom) => (300, 340),
            (OverlayKind::Image, Self::Left) => (50, 200),
            (OverlayKind::Image, Self::Right) => (580, 200),
            (OverlayKind::Image, Self::Center) => (300, 200),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "center" => Ok(Self::Center),
            other => Err(format!("unknown position '{other}'")),
        }
    }
}
