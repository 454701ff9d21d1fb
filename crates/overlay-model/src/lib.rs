//! Overlaycast Overlay Model
//!
//! Defines the data contracts for overlays composited onto the stream:
//! - **Position:** the five anchor names and their fixed pixel table
//! - **Overlay:** validated text/image definitions sharing positional fields
//! - **Store:** the lock-guarded, insertion-ordered set of live overlays
//!
//! Pixel offsets are always derived from the anchor on the fixed
//! 720x480 canvas; they are never accepted from callers.

pub mod overlay;
pub mod position;
pub mod store;

pub use overlay::*;
pub use position::*;
pub use store::*;
