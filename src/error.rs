//! Error types for the preview engine

use thiserror::Error;

/// Result type alias for preview operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling, rendering, or capturing a preview
#[derive(Error, Debug)]
pub enum Error {
    /// The source text does not declare a `function Name(...)` component
    #[error("No component function found: {0}")]
    NoComponentFunction(String),

    /// The source text could not be prepared for the sandbox
    #[error("Invalid component source: {0}")]
    InvalidSource(String),

    /// The isolated context failed to load or answer
    #[error("Sandbox surface error: {0}")]
    Surface(String),

    /// Rasterization or thumbnail derivation failed
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Another capture is already running against the same sandbox
    #[error("A capture is already in progress for this preview")]
    CaptureInProgress,

    /// A single image could not be proxied into a data URI
    #[error("Failed to fetch image {url}: {reason}")]
    ImageFetch { url: String, reason: String },

    /// Raster decode/encode failure
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The preview has been disposed and can no longer be driven
    #[error("Preview has been disposed")]
    Disposed,

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Malformed JSON crossing the sandbox boundary
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
