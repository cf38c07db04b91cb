//! Error types for the archive module.

use hearth_core::CoreError;
use thiserror::Error;

/// Errors that can occur while writing or reading an archive.
///
/// Damaged content entries are not errors: they are reported through
/// [`ReadOutcome`](crate::ReadOutcome).
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Content, I/O or interruption error from the core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The archive holds neither document entry.
    #[error("archive {archive} has no document entry")]
    MissingDocumentEntry { archive: String },

    /// Not a single entry of the archive could be read.
    #[error("archive {archive} has no readable entry")]
    NoReadableEntries { archive: String },

    /// Manifest written by an unknown format version.
    #[error("unsupported manifest version: {0}")]
    UnsupportedManifestVersion(String),

    /// Manifest entry that does not follow the record layout.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// Document encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Document decoding failed.
    #[error("decoding error: {0}")]
    Decoding(String),
}

impl ArchiveError {
    /// Whether this error is cooperative cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ArchiveError::Core(e) if e.is_interrupted())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(error: std::io::Error) -> Self {
        ArchiveError::Core(CoreError::from(error))
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
