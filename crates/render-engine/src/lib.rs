//! Overlaycast Render Engine
//!
//! Turns overlay definitions into pixels and pixels onto frames.
//!
//! # Pipeline Architecture
//!
//! ```text
//! OverlayStore ──snapshot──▶ OverlayRenderer ──▶ build_cache()
//!      │                     (text / image)          │
//!      │                                             ▼
//!      │                                    OverlayCache (Arc swap)
//!      │                                             │
//!      └──── live x,y ──────────┐        ┌── snapshot┘
//!                               ▼        ▼
//!                raw frame ──▶  composite()  ──▶ composited frame
//! ```
//!
//! Rasterization is slow and runs at most once per refresh interval;
//! compositing is the per-frame hot path and touches no fonts or files.

pub mod bitmap;
pub mod cache;
pub mod compositor;
pub mod font;
pub mod renderer;

pub use bitmap::*;
pub use cache::*;
pub use compositor::*;
pub use font::*;
pub use renderer::*;
