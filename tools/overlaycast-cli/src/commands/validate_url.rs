//! Check a URL against the RTSP grammar.

use overlaycast_stream_engine::{redact_credentials, validate_rtsp_url};

pub fn run(url: &str) -> anyhow::Result<()> {
    validate_rtsp_url(url)?;
    println!("[OK] {} is a valid RTSP URL", redact_credentials(url));
    Ok(())
}
