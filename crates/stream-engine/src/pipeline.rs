//! GStreamer-backed RTSP frame source.
//!
//! Decoding is delegated to `uridecodebin`; frames leave the pipeline
//! through an `appsink` already converted to packed RGB (and, by default,
//! scaled to the 720x480 overlay canvas).

use std::sync::OnceLock;
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use image::RgbImage;
use overlaycast_common::config::StreamDefaults;
use overlaycast_common::error::{OverlaycastError, OverlaycastResult};
use overlaycast_overlay_model::{CANVAS_HEIGHT, CANVAS_WIDTH};
use overlaycast_render_engine::Frame;

use crate::source::{FrameSource, SourceOpener};
use crate::url::redact_credentials;

/// How long one `try_pull_sample` call may block before the bus is checked.
const PULL_SLICE: Duration = Duration::from_millis(250);

/// Opens [`GstFrameSource`]s.
#[derive(Debug, Clone)]
pub struct GstSourceOpener {
    open_timeout: Duration,
    scale_to_canvas: bool,
}

impl GstSourceOpener {
    pub fn new(open_timeout: Duration, scale_to_canvas: bool) -> Self {
        Self {
            open_timeout,
            scale_to_canvas,
        }
    }

    pub fn from_config(config: &StreamDefaults) -> Self {
        Self::new(
            Duration::from_secs(config.open_timeout_secs.max(1)),
            config.scale_to_canvas,
        )
    }
}

impl Default for GstSourceOpener {
    fn default() -> Self {
        Self::from_config(&StreamDefaults::default())
    }
}

impl SourceOpener for GstSourceOpener {
    fn open(&self, url: &str) -> OverlaycastResult<Box<dyn FrameSource>> {
        let source = GstFrameSource::open(url, self.open_timeout, self.scale_to_canvas)?;
        Ok(Box::new(source))
    }
}

/// A playing decode pipeline ending in an appsink.
pub struct GstFrameSource {
    label: String,
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    closed: bool,
}

impl GstFrameSource {
    /// Build the pipeline for `url` and wait for it to reach Playing.
    pub fn open(url: &str, open_timeout: Duration, scale_to_canvas: bool) -> OverlaycastResult<Self> {
        init_gstreamer()?;
        let label = redact_credentials(url);

        let pipeline = gst::parse::launch(&source_launch(url, scale_to_canvas))
            .map_err(|e| {
                OverlaycastError::capture_open(format!("Failed to build pipeline for {label}: {e}"))
            })?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| OverlaycastError::capture_open("Launch string did not produce a pipeline"))?;

        let sink = pipeline
            .by_name("sink")
            .and_then(|element| element.dynamic_cast::<gst_app::AppSink>().ok())
            .ok_or_else(|| OverlaycastError::capture_open("Pipeline has no appsink named 'sink'"))?;

        // From here on Drop takes the pipeline back to Null on any early return.
        let source = Self {
            label,
            pipeline,
            sink,
            closed: false,
        };

        tracing::info!(source = %source.label, "Opening RTSP source");
        source.pipeline.set_state(gst::State::Playing).map_err(|e| {
            OverlaycastError::capture_open(
                pop_bus_error(&source.pipeline)
                    .unwrap_or_else(|| format!("Failed to start pipeline for {}: {e:?}", source.label)),
            )
        })?;

        let wait_secs = open_timeout.as_secs().max(1);
        match source.pipeline.state(gst::ClockTime::from_seconds(wait_secs)) {
            (Ok(_), gst::State::Playing, _) => {}
            (Ok(_), state, _) => {
                return Err(OverlaycastError::capture_open(format!(
                    "{} did not reach Playing within {wait_secs}s (stuck in {state:?})",
                    source.label
                )));
            }
            (Err(e), _, _) => {
                return Err(OverlaycastError::capture_open(
                    pop_bus_error(&source.pipeline)
                        .unwrap_or_else(|| format!("{} failed to reach Playing: {e:?}", source.label)),
                ));
            }
        }

        tracing::info!(source = %source.label, "RTSP source playing");
        Ok(source)
    }
}

impl FrameSource for GstFrameSource {
    fn read(&mut self) -> OverlaycastResult<Frame> {
        if self.closed {
            return Err(OverlaycastError::capture_read("source is closed"));
        }

        // Blocks until a sample, end-of-stream, or a pipeline error.
        loop {
            let slice = gst::ClockTime::from_mseconds(PULL_SLICE.as_millis() as u64);
            if let Some(sample) = self.sink.try_pull_sample(slice) {
                return frame_from_sample(&sample);
            }
            if self.sink.is_eos() {
                return Err(OverlaycastError::EndOfStream);
            }
            if let Some(message) = pop_bus_error(&self.pipeline) {
                return Err(OverlaycastError::capture_read(message));
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(source = %self.label, error = ?e, "Failed to shut down pipeline");
        } else {
            tracing::debug!(source = %self.label, "Pipeline shut down");
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// The `gst-launch` description used for `url`.
pub fn source_launch(url: &str, scale_to_canvas: bool) -> String {
    let caps = if scale_to_canvas {
        format!("video/x-raw,format=RGB,width={CANVAS_WIDTH},height={CANVAS_HEIGHT}")
    } else {
        "video/x-raw,format=RGB".to_string()
    };
    format!(
        "uridecodebin uri=\"{}\" ! videoconvert ! videoscale ! {caps} ! \
         appsink name=sink max-buffers=2 drop=true sync=false",
        escape_uri(url)
    )
}

/// Copy a packed RGB buffer into a frame, dropping any per-row padding.
pub fn frame_from_packed_rgb(data: &[u8], width: u32, height: u32) -> OverlaycastResult<Frame> {
    if width == 0 || height == 0 {
        return Err(OverlaycastError::capture_read(format!(
            "empty frame geometry {width}x{height}"
        )));
    }
    let row_bytes = width as usize * 3;
    let rows = height as usize;
    let stride = data.len() / rows;
    if stride < row_bytes {
        return Err(OverlaycastError::capture_read(format!(
            "buffer of {} bytes is too small for {width}x{height} RGB",
            data.len()
        )));
    }

    let pixels = if stride == row_bytes {
        data[..row_bytes * rows].to_vec()
    } else {
        let mut pixels = Vec::with_capacity(row_bytes * rows);
        for row in data.chunks(stride).take(rows) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }
        pixels
    };

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| OverlaycastError::capture_read("frame buffer size mismatch"))
}

fn frame_from_sample(sample: &gst::Sample) -> OverlaycastResult<Frame> {
    let caps = sample
        .caps()
        .ok_or_else(|| OverlaycastError::capture_read("sample has no caps"))?;
    let structure = caps
        .structure(0)
        .ok_or_else(|| OverlaycastError::capture_read("sample caps are empty"))?;
    let dimension = |field: &str| -> OverlaycastResult<u32> {
        let value = structure
            .get::<i32>(field)
            .map_err(|e| OverlaycastError::capture_read(format!("caps field {field}: {e}")))?;
        u32::try_from(value)
            .map_err(|_| OverlaycastError::capture_read(format!("negative caps {field}: {value}")))
    };
    let width = dimension("width")?;
    let height = dimension("height")?;

    let buffer = sample
        .buffer()
        .ok_or_else(|| OverlaycastError::capture_read("sample has no buffer"))?;
    let map = buffer
        .map_readable()
        .map_err(|e| OverlaycastError::capture_read(format!("unreadable buffer: {e}")))?;
    frame_from_packed_rgb(map.as_slice(), width, height)
}

fn pop_bus_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(message) = bus.pop_filtered(&[gst::MessageType::Error]) {
        if let gst::MessageView::Error(err) = message.view() {
            return Some(match err.debug() {
                Some(debug) => format!("{} ({debug})", err.error()),
                None => err.error().to_string(),
            });
        }
    }
    None
}

/// Initialize GStreamer and report its version string.
pub fn gstreamer_version() -> OverlaycastResult<String> {
    init_gstreamer()?;
    Ok(gst::version_string().to_string())
}

fn init_gstreamer() -> OverlaycastResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string())) {
        Ok(()) => Ok(()),
        Err(e) => Err(OverlaycastError::capture_open(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

fn escape_uri(url: &str) -> String {
    url.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_launch_scales_to_canvas() {
        let launch = source_launch("rtsp://cam/live", true);
        assert!(launch.starts_with("uridecodebin uri=\"rtsp://cam/live\""));
        assert!(launch.contains("format=RGB,width=720,height=480"));
        assert!(launch.contains("appsink name=sink"));
    }

    #[test]
    fn test_launch_without_scaling_keeps_native_size() {
        let launch = source_launch("rtsp://cam/live", false);
        assert!(launch.contains("video/x-raw,format=RGB !"));
        assert!(!launch.contains("width="));
    }

    #[test]
    fn test_launch_escapes_quotes() {
        let launch = source_launch("rtsp://cam/a\"b", true);
        assert!(launch.contains("uri=\"rtsp://cam/a\\\"b\""));
    }

    #[test]
    fn test_packed_rgb_without_padding() {
        let data: Vec<u8> = (0..2 * 2 * 3).map(|v| v as u8).collect();
        let frame = frame_from_packed_rgb(&data, 2, 2).unwrap();
        assert_eq!(*frame.get_pixel(1, 1), Rgb([9, 10, 11]));
    }

    #[test]
    fn test_packed_rgb_strips_row_padding() {
        // 3 px wide rows are 9 bytes, padded to a 12 byte stride.
        let mut data = Vec::new();
        for row in 0..2u8 {
            data.extend_from_slice(&[row; 9]);
            data.extend_from_slice(&[0xEE; 3]);
        }
        let frame = frame_from_packed_rgb(&data, 3, 2).unwrap();
        assert_eq!(*frame.get_pixel(2, 0), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(2, 1), Rgb([1, 1, 1]));
    }

    #[test]
    fn test_packed_rgb_rejects_short_buffer() {
        let err = frame_from_packed_rgb(&[0; 10], 4, 4).unwrap_err();
        assert!(matches!(err, OverlaycastError::CaptureReadFailed { .. }));
        assert!(frame_from_packed_rgb(&[], 0, 4).is_err());
    }
}
