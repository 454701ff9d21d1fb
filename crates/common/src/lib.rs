//! Overlaycast Common Utilities
//!
//! Shared infrastructure for all Overlaycast crates:
//! - Error types and result aliases
//! - Refresh timing for the overlay cache
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
