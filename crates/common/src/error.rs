//! Error types shared across Overlaycast crates.

/// Top-level error type for Overlaycast operations.
#[derive(Debug, thiserror::Error)]
pub enum OverlaycastError {
    #[error("Invalid RTSP URL: {url}")]
    InvalidUrl { url: String },

    #[error("Invalid overlay definition: {message}")]
    InvalidDefinition { message: String },

    #[error("Stream is already running")]
    AlreadyRunning,

    #[error("No active stream")]
    NotRunning,

    #[error("Overlay not found: {id}")]
    NotFound { id: String },

    #[error("Failed to open capture source: {message}")]
    CaptureOpenFailed { message: String },

    #[error("Failed to read frame: {message}")]
    CaptureReadFailed { message: String },

    #[error("Capture source reached end of stream")]
    EndOfStream,

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using OverlaycastError.
pub type OverlaycastResult<T> = Result<T, OverlaycastError>;

/// Coarse classification of errors, for callers that map failures onto
/// response codes or exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input; rejected with no state change.
    InvalidInput,
    /// Operation on an unknown overlay id.
    NotFound,
    /// Operation not valid in the current stream state.
    Conflict,
    /// Source unreachable or unreadable; fatal to the current session.
    CaptureFailure,
    /// A single overlay could not be rasterized.
    RenderFailure,
    /// Anything else (I/O, encoding, configuration).
    Internal,
}

impl OverlaycastError {
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: msg.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn capture_open(msg: impl Into<String>) -> Self {
        Self::CaptureOpenFailed {
            message: msg.into(),
        }
    }

    pub fn capture_read(msg: impl Into<String>) -> Self {
        Self::CaptureReadFailed {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidDefinition { .. } => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyRunning | Self::NotRunning => ErrorKind::Conflict,
            Self::CaptureOpenFailed { .. } | Self::CaptureReadFailed { .. } | Self::EndOfStream => {
                ErrorKind::CaptureFailure
            }
            Self::Render { .. } => ErrorKind::RenderFailure,
            Self::Encode { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            OverlaycastError::invalid_url("http://x").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            OverlaycastError::invalid_definition("empty").kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            OverlaycastError::not_found("abc").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(OverlaycastError::AlreadyRunning.kind(), ErrorKind::Conflict);
        assert_eq!(OverlaycastError::NotRunning.kind(), ErrorKind::Conflict);
        assert_eq!(OverlaycastError::EndOfStream.kind(), ErrorKind::CaptureFailure);
        assert_eq!(
            OverlaycastError::capture_open("refused").kind(),
            ErrorKind::CaptureFailure
        );
        assert_eq!(
            OverlaycastError::render("bad png").kind(),
            ErrorKind::RenderFailure
        );
        assert_eq!(OverlaycastError::encode("jpeg").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_messages_carry_context() {
        let err = OverlaycastError::not_found("0f1e");
        assert_eq!(err.to_string(), "Overlay not found: 0f1e");

        let err = OverlaycastError::invalid_url("http://example.com");
        assert!(err.to_string().contains("http://example.com"));
    }
}
