//! Overlaycast Stream Engine
//!
//! Runs the live re-streaming session: pulls frames from an RTSP source,
//! composites the current overlays onto each one, and publishes the result
//! as a multipart JPEG stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    StreamController                      │
//! │   start / pause / resume / stop        overlay CRUD ──┐  │
//! │        │                                              ▼  │
//! │        ▼                                      OverlayStore│
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────┐  │
//! │  │ FrameSource │──▶│  composite() │──▶│OutputPublisher│  │
//! │  │ (GStreamer) │   │ OverlayCache │   │  JPEG + watch │  │
//! │  └─────────────┘   └──────────────┘   └───────┬───────┘  │
//! └───────────────────────────────────────────────┼──────────┘
//!                                                 ▼
//!                                  FrameStream (multipart chunks)
//! ```
//!
//! The frame loop owns the capture handle and runs on its own thread;
//! overlay mutations arrive from other threads at any time.

pub mod pipeline;
pub mod publisher;
pub mod session;
pub mod source;
pub mod url;

pub use pipeline::{gstreamer_version, GstFrameSource, GstSourceOpener};
pub use publisher::*;
pub use session::*;
pub use source::*;
pub use url::*;
