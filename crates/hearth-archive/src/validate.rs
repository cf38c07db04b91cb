//! Archive integrity triage and repair.
//!
//! Validation first streams every local entry from the start of the file.
//! If the stream breaks, the central directory is tried instead and each
//! entry is checked on its own. A truncated archive has no central
//! directory, in which case the entries streamed before the break are the
//! readable subset.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use hearth_core::{cancel, ArchiveSource, CancellationToken, CoreError};
use tracing::{debug, warn};
use zip::read::read_zipfile_from_stream;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ArchiveError, Result};

/// Result of [`validate_archive`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveValidation {
    /// Entries that read back fully, in archive order.
    pub entries: Vec<String>,
    /// Entries known to exist but unreadable.
    pub dropped: Vec<String>,
    /// Every entry is readable and the central directory is intact.
    pub fully_valid: bool,
    /// Whether the central directory could be opened.
    pub central_directory: bool,
}

struct StreamScan {
    entries: Vec<String>,
    broken_at: Option<String>,
    failed: bool,
}

/// Check every entry of the archive at `path`.
pub fn validate_archive(path: &Path, cancel: &CancellationToken) -> Result<ArchiveValidation> {
    let scan = stream_entries(path, cancel)?;
    if !scan.failed && !scan.entries.is_empty() {
        // The stream stops at the central directory; make sure it opens.
        if let Ok(zip) = open_zip(path) {
            if zip.len() == scan.entries.len() {
                return Ok(ArchiveValidation {
                    entries: scan.entries,
                    dropped: Vec::new(),
                    fully_valid: true,
                    central_directory: true,
                });
            }
        }
    }
    debug!(path = %path.display(), streamed = scan.entries.len(), "stream validation failed, checking entries individually");

    match open_zip(path) {
        Ok(mut zip) => {
            let mut entries = Vec::new();
            let mut dropped = Vec::new();
            for index in 0..zip.len() {
                cancel::checkpoint(cancel)?;
                let name = zip.name_for_index(index).unwrap_or_default().to_string();
                let readable = match zip.by_index(index) {
                    Ok(mut file) => match cancel::drain(&mut file, cancel) {
                        Ok(_) => true,
                        Err(e) if e.is_interrupted() => return Err(e.into()),
                        Err(_) => false,
                    },
                    Err(_) => false,
                };
                if readable {
                    entries.push(name);
                } else {
                    dropped.push(name);
                }
            }
            if entries.is_empty() {
                return Err(no_readable_entries(path));
            }
            Ok(ArchiveValidation {
                fully_valid: dropped.is_empty(),
                entries,
                dropped,
                central_directory: true,
            })
        }
        Err(e) => {
            if scan.entries.is_empty() {
                debug!(path = %path.display(), error = %e, "central directory unreadable");
                return Err(no_readable_entries(path));
            }
            Ok(ArchiveValidation {
                entries: scan.entries,
                dropped: scan.broken_at.into_iter().collect(),
                fully_valid: false,
                central_directory: false,
            })
        }
    }
}

/// Stream local entries until the central directory or the first failure.
fn stream_entries(path: &Path, cancel: &CancellationToken) -> Result<StreamScan> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut scan = StreamScan {
        entries: Vec::new(),
        broken_at: None,
        failed: false,
    };
    loop {
        cancel::checkpoint(cancel)?;
        match read_zipfile_from_stream(&mut reader) {
            Ok(Some(mut file)) => {
                let name = file.name().to_string();
                match cancel::drain(&mut file, cancel) {
                    Ok(_) => scan.entries.push(name),
                    Err(e) if e.is_interrupted() => return Err(e.into()),
                    Err(e) => {
                        debug!(entry = %name, error = %e, "entry unreadable while streaming");
                        scan.broken_at = Some(name);
                        scan.failed = true;
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "archive stream broken");
                scan.failed = true;
                break;
            }
        }
    }
    Ok(scan)
}

/// Copy the readable entries of `path` into a temporary archive.
///
/// Entry names, timestamps and comments are kept. The returned source
/// deletes the copy once the last content handle on it is dropped.
pub fn repair_archive(
    path: &Path,
    validation: &ArchiveValidation,
    cancel: &CancellationToken,
) -> Result<Arc<ArchiveSource>> {
    let (file, temp_path) = tempfile::Builder::new()
        .prefix("hearth-repair-")
        .suffix(".zip")
        .tempfile()?
        .into_parts();
    let mut writer = ZipWriter::new(file);
    let keep: HashSet<&str> = validation.entries.iter().map(String::as_str).collect();

    if validation.central_directory {
        let mut zip = open_zip(path)?;
        writer.set_comment(String::from_utf8_lossy(zip.comment()).into_owned());
        for index in 0..zip.len() {
            cancel::checkpoint(cancel)?;
            let file = zip.by_index_raw(index).map_err(|e| zip_error(path, e))?;
            if keep.contains(file.name()) {
                writer.raw_copy_file(file).map_err(|e| zip_error(path, e))?;
            }
        }
    } else {
        let mut reader = BufReader::new(File::open(path)?);
        let mut copied = 0;
        while copied < validation.entries.len() {
            cancel::checkpoint(cancel)?;
            let Some(mut file) = read_zipfile_from_stream(&mut reader).map_err(|e| zip_error(path, e))? else {
                break;
            };
            let name = file.name().to_string();
            if !keep.contains(name.as_str()) {
                continue;
            }
            let method = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = SimpleFileOptions::default().compression_method(method);
            if let Some(modified) = file.last_modified() {
                options = options.last_modified_time(modified);
            }
            if file.is_dir() {
                writer.add_directory(name, options).map_err(|e| zip_error(path, e))?;
            } else {
                writer.start_file(name, options).map_err(|e| zip_error(path, e))?;
                cancel::copy(&mut file, &mut writer, cancel)?;
            }
            copied += 1;
        }
    }

    writer.finish().map_err(|e| zip_error(path, e))?;
    warn!(
        path = %path.display(),
        kept = validation.entries.len(),
        dropped = validation.dropped.len(),
        "archive repaired into temporary copy"
    );
    Ok(ArchiveSource::temporary(temp_path))
}

fn open_zip(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| zip_error(path, e))
}

fn zip_error(path: &Path, error: ZipError) -> ArchiveError {
    ArchiveError::Core(CoreError::from_zip(path, error))
}

fn no_readable_entries(path: &Path) -> ArchiveError {
    ArchiveError::NoReadableEntries {
        archive: path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{ArchiveWriter, WriterConfig};
    use hearth_core::Content;
    use hearth_testkit::{HomeFixture, SampleHome};
    use std::path::PathBuf;

    const MARKER: &[u8] = b"second-model-marker-second-model-marker-second-model-marker";

    fn saved_home(fixture: &HomeFixture) -> PathBuf {
        let mut home = SampleHome::named("triage");
        home.add_piece(
            "first",
            Content::from_bytes("first.png", HomeFixture::blob(200, 1)),
            Content::from_bytes("first.obj", HomeFixture::blob(200, 2)),
        );
        home.add_piece(
            "second",
            Content::from_bytes("second.png", HomeFixture::blob(200, 3)),
            Content::from_bytes("second.obj", MARKER.to_vec()),
        );
        let path = fixture.path("triage.sh3d");
        ArchiveWriter::new(fixture.digests.clone(), WriterConfig::default())
            .write_to_path(&home, &path, &CancellationToken::new())
            .unwrap();
        path
    }

    fn marker_offset(data: &[u8]) -> usize {
        data.windows(MARKER.len()).position(|w| w == MARKER).unwrap()
    }

    fn names(source: &ArchiveSource) -> Vec<String> {
        let zip = source.open_zip().unwrap();
        (0..zip.len()).map(|i| zip.name_for_index(i).unwrap().to_string()).collect()
    }

    #[test]
    fn test_intact_archive_is_fully_valid() {
        let fixture = HomeFixture::new();
        let path = saved_home(&fixture);
        let validation = validate_archive(&path, &CancellationToken::new()).unwrap();
        assert!(validation.fully_valid);
        assert_eq!(validation.entries, vec!["Home", "ContentDigests", "0", "1", "2", "3"]);
        assert!(validation.dropped.is_empty());
    }

    #[test]
    fn test_truncated_archive_keeps_streamed_prefix() {
        let fixture = HomeFixture::new();
        let path = saved_home(&fixture);
        let data = std::fs::read(&path).unwrap();
        let cut = marker_offset(&data) + MARKER.len() / 2;
        std::fs::write(&path, &data[..cut]).unwrap();

        let validation = validate_archive(&path, &CancellationToken::new()).unwrap();
        assert!(!validation.fully_valid);
        assert!(!validation.central_directory);
        assert_eq!(validation.entries, vec!["Home", "ContentDigests", "0", "1", "2"]);
        assert_eq!(validation.dropped, vec!["3"]);

        let repaired = repair_archive(&path, &validation, &CancellationToken::new()).unwrap();
        assert!(repaired.is_temporary());
        assert_eq!(names(&repaired), validation.entries);
    }

    #[test]
    fn test_corrupted_entry_is_dropped_via_central_directory() {
        let fixture = HomeFixture::new();
        let path = saved_home(&fixture);
        let mut data = std::fs::read(&path).unwrap();
        let offset = marker_offset(&data);
        data[offset] ^= 0xff;
        std::fs::write(&path, &data).unwrap();

        let validation = validate_archive(&path, &CancellationToken::new()).unwrap();
        assert!(!validation.fully_valid);
        assert!(validation.central_directory);
        assert_eq!(validation.dropped, vec!["3"]);
        assert_eq!(validation.entries, vec!["Home", "ContentDigests", "0", "1", "2"]);

        let repaired = repair_archive(&path, &validation, &CancellationToken::new()).unwrap();
        assert_eq!(names(&repaired), validation.entries);
        let temp_path = repaired.path().to_path_buf();
        drop(repaired);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_garbage_has_no_readable_entries() {
        let fixture = HomeFixture::new();
        let path = fixture.write_file("garbage.sh3d", b"this is not a zip archive at all");
        let err = validate_archive(&path, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ArchiveError::NoReadableEntries { .. }));
    }
}
