//! Frame acquisition interface.
//!
//! The frame loop only sees [`FrameSource`]; how frames are produced is the
//! business of whichever [`SourceOpener`] the controller was built with.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{ImageBuffer, Rgb};
use overlaycast_common::error::{OverlaycastError, OverlaycastResult};
use overlaycast_overlay_model::{CANVAS_HEIGHT, CANVAS_WIDTH};
use overlaycast_render_engine::Frame;

/// An open capture handle.
///
/// `read` blocks until the next decoded frame is available. Once it returns
/// an error the source is finished and should be closed.
pub trait FrameSource: Send {
    /// Next decoded frame.
    fn read(&mut self) -> OverlaycastResult<Frame>;

    /// Release the underlying capture resources. Safe to call twice.
    fn close(&mut self);

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// Opens a [`FrameSource`] for a validated stream URL.
pub trait SourceOpener: Send + Sync {
    fn open(&self, url: &str) -> OverlaycastResult<Box<dyn FrameSource>>;
}

/// Opener for [`PatternSource`]: ignores the URL and produces synthetic
/// frames. Used for dry runs and tests.
#[derive(Debug, Clone)]
pub struct PatternSourceOpener {
    width: u32,
    height: u32,
    frame_interval: Duration,
    frame_limit: Option<u64>,
    opens: Arc<AtomicUsize>,
}

impl PatternSourceOpener {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame_interval: Duration::from_millis(33),
            frame_limit: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay between frames, emulating a camera's frame rate.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Report end-of-stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// How many sources this opener has handed out.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for PatternSourceOpener {
    fn default() -> Self {
        Self::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }
}

impl SourceOpener for PatternSourceOpener {
    fn open(&self, url: &str) -> OverlaycastResult<Box<dyn FrameSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(url, width = self.width, height = self.height, "Opening synthetic source");
        Ok(Box::new(PatternSource {
            width: self.width,
            height: self.height,
            frame_interval: self.frame_interval,
            frame_limit: self.frame_limit,
            produced: 0,
            closed: false,
        }))
    }
}

/// Scrolling color bars with a moving marker, one frame per `read`.
#[derive(Debug)]
pub struct PatternSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    frame_limit: Option<u64>,
    produced: u64,
    closed: bool,
}

const BAR_COLORS: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 0, 255]),
    Rgb([255, 255, 0]),
    Rgb([255, 0, 255]),
    Rgb([0, 255, 255]),
];

/// Draw frame number `index` of the pattern.
pub fn pattern_frame(width: u32, height: u32, index: u64) -> Frame {
    let bar_width = (width / BAR_COLORS.len() as u32).max(1);
    let shift = (index * 4 % u64::from(width.max(1))) as u32;
    let marker_x = (index * 8 % u64::from(width.max(1))) as u32;

    ImageBuffer::from_fn(width, height, |x, y| {
        if y >= height.saturating_sub(height / 8) {
            let level = (x * 255 / width.max(1)) as u8;
            return Rgb([level, level, level]);
        }
        if x.abs_diff(marker_x) < 4 {
            return Rgb([255, 255, 255]);
        }
        let bar = ((x + shift) / bar_width) as usize % BAR_COLORS.len();
        BAR_COLORS[bar]
    })
}

impl FrameSource for PatternSource {
    fn read(&mut self) -> OverlaycastResult<Frame> {
        if self.closed {
            return Err(OverlaycastError::capture_read("source is closed"));
        }
        if self.frame_limit.is_some_and(|limit| self.produced >= limit) {
            return Err(OverlaycastError::EndOfStream);
        }
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        let frame = pattern_frame(self.width, self.height, self.produced);
        self.produced += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn describe(&self) -> String {
        format!("pattern {}x{}", self.width, self.height)
    }
}
