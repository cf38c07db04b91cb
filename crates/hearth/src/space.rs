//! Free space on the destination volume.

use std::path::Path;

use sysinfo::Disks;
use tracing::debug;

use crate::error::{HearthError, Result};

/// Available bytes on the volume holding `dir`, when the volume is known.
pub fn available_space(dir: &Path) -> Option<u64> {
    let dir = dir.canonicalize().ok()?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| dir.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Fail with [`HearthError::InsufficientSpace`] unless `required` bytes fit.
///
/// An unknown volume passes.
pub fn ensure_space(path: &Path, required: u64, available: Option<u64>) -> Result<()> {
    match available {
        Some(available) if available < required => Err(HearthError::InsufficientSpace {
            path: path.to_path_buf(),
            required,
            available,
        }),
        Some(_) => Ok(()),
        None => {
            debug!(path = %path.display(), "destination volume unknown, skipping space check");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_space() {
        let path = Path::new("/homes/house.sh3d");
        assert!(ensure_space(path, 100, Some(100)).is_ok());
        assert!(ensure_space(path, 100, None).is_ok());
        match ensure_space(path, 101, Some(100)) {
            Err(HearthError::InsufficientSpace { required, available, .. }) => {
                assert_eq!((required, available), (101, 100));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_directory_has_no_volume() {
        assert_eq!(available_space(Path::new("/definitely/not/here")), None);
    }
}
