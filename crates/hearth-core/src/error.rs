//! Error types for Hearth Core.

use std::path::Path;

use thiserror::Error;

/// Core errors that can occur while reading or fingerprinting content.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Cooperative cancellation was observed mid-operation.
    #[error("operation interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("archive {archive}: {message}")]
    Archive { archive: String, message: String },

    #[error("entry {entry} not found in archive {archive}")]
    EntryNotFound { archive: String, entry: String },

    #[error("content is not readable: {0}")]
    Unreadable(String),

    #[error("invalid digest encoding: {0}")]
    InvalidDigest(String),

    #[error("malformed placeholder: {0}")]
    MalformedPlaceholder(String),
}

impl CoreError {
    /// Whether this error is the interruption path rather than a failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CoreError::Interrupted)
    }

    /// Map a zip error for the archive at `path`.
    pub fn from_zip(path: &Path, error: zip::result::ZipError) -> Self {
        match error {
            zip::result::ZipError::Io(e) => CoreError::from(e),
            other => CoreError::Archive {
                archive: path.display().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(error: std::io::Error) -> Self {
        if crate::cancel::is_interrupted_io_error(&error) {
            CoreError::Interrupted
        } else {
            CoreError::Io(error)
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
