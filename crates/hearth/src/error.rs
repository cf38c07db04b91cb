//! Error types for the store.

use std::path::PathBuf;

use hearth_archive::ArchiveError;
use hearth_core::CoreError;
use hearth_recovery::RecoveryError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum HearthError {
    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Archive error.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Recovery error.
    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    /// The destination volume cannot hold the saved archive. Nothing was
    /// overwritten.
    #[error("insufficient space for {path}: {required} bytes required, {available} available")]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be loaded.
    #[error("invalid configuration {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl HearthError {
    /// Whether this error is cooperative cancellation rather than a failure.
    pub fn is_interrupted(&self) -> bool {
        match self {
            HearthError::Core(e) => e.is_interrupted(),
            HearthError::Archive(e) => e.is_interrupted(),
            HearthError::Recovery(e) => e.is_interrupted(),
            HearthError::Io(e) => hearth_core::cancel::is_interrupted_io_error(e),
            _ => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, HearthError>;
