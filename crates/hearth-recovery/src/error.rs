//! Error types for the recovery module.

use std::path::PathBuf;

use hearth_archive::ArchiveError;
use thiserror::Error;

/// Errors that can occur while scanning or writing recovery files.
///
/// Background snapshot failures never reach the host: they are logged and
/// reported as [`RecoveryEvent::SnapshotFailed`](crate::RecoveryEvent).
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Archive read or write failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// I/O error on the recovery directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No free recovery file name could be found.
    #[error("no free recovery file name in {0}")]
    NoFreeName(PathBuf),

    /// The background worker is gone.
    #[error("recovery worker stopped")]
    WorkerStopped,
}

impl RecoveryError {
    /// Whether this error is cooperative cancellation.
    pub fn is_interrupted(&self) -> bool {
        match self {
            RecoveryError::Archive(e) => e.is_interrupted(),
            RecoveryError::Io(e) => hearth_core::cancel::is_interrupted_io_error(e),
            _ => false,
        }
    }
}

/// Result type for recovery operations.
pub type Result<T> = std::result::Result<T, RecoveryError>;
