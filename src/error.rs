//! Error types for capture, compositing and archiving

use thiserror::Error;

/// Result type alias for bannershot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing or packaging banners
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch a browser session
    #[error("Session initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a URL
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to capture or composite a screenshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to execute JavaScript in the page
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// Tile decode or canvas encode failure
    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    /// Archive stream failure; fatal for the batch
    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ArchiveError(err.to_string())
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
