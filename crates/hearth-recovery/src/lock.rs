//! Advisory locks on recovery files.
//!
//! A held lock means a running process owns the recovery file. Locks are
//! exclusive and non-blocking; they are released when the owning
//! [`RecoveryLock`] is dropped or the process exits.

use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RecoveryLock {
    file: File,
    path: PathBuf,
}

impl RecoveryLock {
    /// Lock an existing file. `Ok(None)` if another owner holds it.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new().append(true).open(path)?;
        match file.try_lock() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RecoveryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Whether some other owner holds the lock on `path`.
///
/// Probes by locking and immediately releasing.
pub fn is_locked_elsewhere(path: &Path) -> io::Result<bool> {
    Ok(RecoveryLock::try_acquire(path)?.is_none())
}
