//! Recovery records, file naming and events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};
use crate::lock::RecoveryLock;

/// Extension of recovery files pending adoption.
pub const RECOVERED_SUFFIX: &str = "recovered";

/// Extension given to recovery files that could not be read.
pub const UNRECOVERABLE_SUFFIX: &str = "unrecoverable";

const NAME_ATTEMPTS: usize = 32;

/// Host-assigned identity of an open document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey(pub u64);

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The recovery file currently shadowing an open document.
#[derive(Debug)]
pub(crate) struct RecoveryRecord {
    pub path: PathBuf,
    /// Released while the file is rewritten.
    pub lock: Option<RecoveryLock>,
    /// Revision of the last written snapshot.
    pub revision: Option<u64>,
}

/// A document read back from an abandoned recovery file.
#[derive(Debug)]
pub struct RecoveredDocument<D> {
    pub document: D,
    /// The recovery file it was read from.
    pub path: PathBuf,
    /// References that could not be restored.
    pub invalid_contents: Vec<String>,
}

impl<D> RecoveredDocument<D> {
    pub fn is_damaged(&self) -> bool {
        !self.invalid_contents.is_empty()
    }
}

/// Notifications for host UIs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryEvent {
    /// A startup scan finished with documents to offer.
    RecoveredReady { count: usize },
    SnapshotWritten { key: DocumentKey, path: PathBuf },
    SnapshotRemoved { key: DocumentKey, path: PathBuf },
    SnapshotFailed { key: DocumentKey, message: String },
    /// A recovery file was renamed aside after a failed read.
    Unrecoverable { path: PathBuf },
}

/// Pick an unused recovery file name in `directory`.
///
/// Named documents get `<name>.recovered`, or `<name>-<hex>.recovered` when
/// that is taken. Unnamed documents get a random name.
pub(crate) fn fresh_path(
    directory: &Path,
    name: Option<&str>,
    records: &HashMap<DocumentKey, RecoveryRecord>,
) -> Result<PathBuf> {
    let taken = |path: &Path| path.exists() || records.values().any(|record| record.path == path);

    let base = name
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty());

    if let Some(base) = &base {
        let candidate = directory.join(format!("{base}.{RECOVERED_SUFFIX}"));
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    let mut rng = rand::thread_rng();
    for _ in 0..NAME_ATTEMPTS {
        let stem = match &base {
            Some(base) => format!("{base}-{:08x}", rng.gen::<u32>()),
            None => format!("{:016x}", rng.gen::<u64>()),
        };
        let candidate = directory.join(format!("{stem}.{RECOVERED_SUFFIX}"));
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(RecoveryError::NoFreeName(directory.to_path_buf()))
}

/// Whether `path` carries the recovered suffix.
pub(crate) fn is_recovery_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == RECOVERED_SUFFIX)
}
