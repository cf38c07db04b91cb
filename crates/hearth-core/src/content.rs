//! Content handles.
//!
//! A [`Content`] is a cheap-clone handle on a byte stream. Handles are shared
//! by the document graph and the digest cache and are never freed explicitly:
//! the last clone to drop releases the underlying resource, including any
//! temporary archive copy it points into.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tempfile::TempPath;
use zip::result::ZipError;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::cancel;
use crate::error::{CoreError, Result};

/// A ref-counted archive location that content handles point into.
///
/// When the source owns a temporary copy (repair output or a copied
/// recovery file) the copy is deleted once the last handle is dropped.
pub struct ArchiveSource {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl ArchiveSource {
    /// An archive the caller owns and keeps on disk.
    pub fn new(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            temp: None,
        })
    }

    /// An archive living in a temporary file, deleted with the source.
    pub fn temporary(temp: TempPath) -> Arc<Self> {
        Arc::new(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Open the archive's central directory.
    pub fn open_zip(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path)?;
        ZipArchive::new(file).map_err(|e| CoreError::from_zip(&self.path, e))
    }
}

impl fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("path", &self.path)
            .field("temporary", &self.is_temporary())
            .finish()
    }
}

/// Where a content's bytes live.
#[derive(Clone)]
pub enum Locator {
    /// A file on the local file system.
    File { path: PathBuf },
    /// Bytes held in memory, e.g. freshly imported data.
    Memory { name: String, data: Bytes },
    /// An entry inside a zip archive.
    ArchiveEntry {
        archive: Arc<ArchiveSource>,
        entry: String,
    },
    /// A reference written in place of content while serializing.
    Placeholder { path: String },
    /// Content that could not be recovered.
    Missing { description: String },
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::File { path } => write!(f, "File({})", path.display()),
            Locator::Memory { name, data } => write!(f, "Memory({}, {} bytes)", name, data.len()),
            Locator::ArchiveEntry { archive, entry } => {
                write!(f, "ArchiveEntry({}!{})", archive.path().display(), entry)
            }
            Locator::Placeholder { path } => write!(f, "Placeholder({})", path),
            Locator::Missing { description } => write!(f, "Missing({})", description),
        }
    }
}

pub(crate) struct ContentInner {
    locator: Locator,
    multi_part: bool,
    temporary: bool,
}

/// A shared handle on an addressable binary resource.
#[derive(Clone)]
pub struct Content {
    inner: Arc<ContentInner>,
}

impl Content {
    pub(crate) fn new(locator: Locator, multi_part: bool, temporary: bool) -> Self {
        Self {
            inner: Arc::new(ContentInner {
                locator,
                multi_part,
                temporary,
            }),
        }
    }

    /// A single file.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Locator::File { path: path.into() }, false, false)
    }

    /// The principal file of a resource spanning its whole directory.
    pub fn multi_part_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Locator::File { path: path.into() }, true, false)
    }

    /// In-memory bytes. Always temporary.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(
            Locator::Memory {
                name: name.into(),
                data: data.into(),
            },
            false,
            true,
        )
    }

    /// An entry of `archive`.
    pub fn archive_entry(archive: Arc<ArchiveSource>, entry: impl Into<String>, multi_part: bool) -> Self {
        Self::new(
            Locator::ArchiveEntry {
                archive,
                entry: entry.into(),
            },
            multi_part,
            false,
        )
    }

    pub fn placeholder(path: impl Into<String>) -> Self {
        Self::new(Locator::Placeholder { path: path.into() }, false, false)
    }

    pub fn missing(description: impl Into<String>) -> Self {
        Self::new(
            Locator::Missing {
                description: description.into(),
            },
            false,
            false,
        )
    }

    /// A new handle on the same locator, flagged as freshly imported.
    pub fn with_temporary(&self, temporary: bool) -> Self {
        Self::new(self.inner.locator.clone(), self.inner.multi_part, temporary)
    }

    /// A new handle on the same locator with a different multi-part flag.
    pub fn with_multi_part(&self, multi_part: bool) -> Self {
        Self::new(self.inner.locator.clone(), multi_part, self.inner.temporary)
    }

    pub fn locator(&self) -> &Locator {
        &self.inner.locator
    }

    pub fn is_multi_part(&self) -> bool {
        self.inner.multi_part
    }

    /// Whether this content is not backed by a durable user file.
    pub fn is_temporary(&self) -> bool {
        self.inner.temporary
            || match &self.inner.locator {
                Locator::Memory { .. } => true,
                Locator::ArchiveEntry { archive, .. } => archive.is_temporary(),
                _ => false,
            }
    }

    /// Whether the digest of this content spans a group of siblings.
    pub fn is_group(&self) -> bool {
        self.inner.multi_part
            && match &self.inner.locator {
                Locator::File { .. } => true,
                Locator::ArchiveEntry { entry, .. } => entry.contains('/'),
                _ => false,
            }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.inner.locator, Locator::Placeholder { .. })
    }

    /// Last path segment of the locator.
    pub fn name(&self) -> &str {
        match &self.inner.locator {
            Locator::File { path } => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default(),
            Locator::Memory { name, .. } => name,
            Locator::ArchiveEntry { entry, .. } => entry.rsplit('/').next().unwrap_or(entry),
            Locator::Placeholder { path } => path,
            Locator::Missing { description } => description,
        }
    }

    /// Open a stream on the content bytes.
    ///
    /// Archive entries are inflated into memory so the stream does not
    /// borrow the archive; a CRC mismatch fails here. Inflation checks
    /// `cancel` between chunks.
    pub fn open(&self, cancel: &CancellationToken) -> Result<Box<dyn Read + Send>> {
        match &self.inner.locator {
            Locator::File { path } => Ok(Box::new(File::open(path)?)),
            Locator::Memory { data, .. } => Ok(Box::new(Cursor::new(data.clone()))),
            Locator::ArchiveEntry { archive, entry } => {
                let mut zip = archive.open_zip()?;
                let mut file = zip.by_name(entry).map_err(|e| match e {
                    ZipError::FileNotFound => CoreError::EntryNotFound {
                        archive: archive.path().display().to_string(),
                        entry: entry.clone(),
                    },
                    other => CoreError::from_zip(archive.path(), other),
                })?;
                let mut data = Vec::with_capacity(file.size() as usize);
                cancel::copy(&mut file, &mut data, cancel)?;
                Ok(Box::new(Cursor::new(data)))
            }
            Locator::Placeholder { path } => Err(CoreError::Unreadable(format!("unresolved placeholder {path}"))),
            Locator::Missing { description } => Err(CoreError::Unreadable(description.clone())),
        }
    }

    /// Read the whole content. Not cancellable.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open(&CancellationToken::new())?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Whether both handles are the same allocation.
    pub fn ptr_eq(&self, other: &Content) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identity of the shared allocation, stable while any clone is alive.
    pub fn handle_id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn downgrade(&self) -> Weak<ContentInner> {
        Arc::downgrade(&self.inner)
    }

    /// The serialized form of this handle.
    pub fn to_ref(&self) -> ContentRef {
        let multi_part = self.inner.multi_part;
        match &self.inner.locator {
            Locator::Placeholder { path } => ContentRef::Placeholder { path: path.clone() },
            Locator::File { path } => ContentRef::File {
                path: path.clone(),
                multi_part,
            },
            Locator::ArchiveEntry { archive, entry } if !archive.is_temporary() => ContentRef::ArchiveEntry {
                archive: archive.path().to_path_buf(),
                entry: entry.clone(),
                multi_part,
            },
            _ => ContentRef::Omitted {
                name: self.name().to_string(),
            },
        }
    }

    /// Rebuild a handle from its serialized form.
    pub fn from_ref(content_ref: ContentRef) -> Self {
        match content_ref {
            ContentRef::Placeholder { path } => Content::placeholder(path),
            ContentRef::File { path, multi_part } => Self::new(Locator::File { path }, multi_part, false),
            ContentRef::ArchiveEntry {
                archive,
                entry,
                multi_part,
            } => Content::archive_entry(ArchiveSource::new(archive), entry, multi_part),
            ContentRef::Omitted { name } => Content::missing(name),
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Content({:?}", self.inner.locator)?;
        if self.inner.multi_part {
            write!(f, ", multi-part")?;
        }
        write!(f, ")")
    }
}

/// How a [`Content`] appears inside a serialized document.
///
/// Content that only exists in memory or in a temporary archive cannot be
/// referenced from outside and is written as `Omitted`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRef {
    Placeholder {
        path: String,
    },
    File {
        path: PathBuf,
        multi_part: bool,
    },
    ArchiveEntry {
        archive: PathBuf,
        entry: String,
        multi_part: bool,
    },
    Omitted {
        name: String,
    },
}

impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ContentRef::deserialize(deserializer).map(Content::from_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_content_is_temporary() {
        let content = Content::from_bytes("icon.png", vec![1, 2, 3]);
        assert!(content.is_temporary());
        assert_eq!(content.read_all().unwrap(), vec![1, 2, 3]);
        assert_eq!(content.to_ref(), ContentRef::Omitted { name: "icon.png".into() });
    }

    #[test]
    fn test_file_content_reads_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"model data").unwrap();
        let content = Content::from_file(file.path());
        assert!(!content.is_temporary());
        assert_eq!(content.read_all().unwrap(), b"model data");
    }

    #[test]
    fn test_placeholder_and_missing_are_unreadable() {
        let cancel = CancellationToken::new();
        assert!(Content::placeholder("0").open(&cancel).is_err());
        assert!(Content::missing("lost").open(&cancel).is_err());
    }

    #[test]
    fn test_archive_entry_open_honours_cancellation() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let mut zip = zip::ZipWriter::new(temp.reopen().unwrap());
        zip.start_file("0", zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(&[9u8; 200_000]).unwrap();
        zip.finish().unwrap();
        let content = Content::archive_entry(ArchiveSource::new(temp.path()), "0", false);

        assert_eq!(content.read_all().unwrap().len(), 200_000);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = content.open(&cancel).err().unwrap();
        assert!(err.is_interrupted());
    }

    #[test]
    fn test_group_detection() {
        assert!(Content::multi_part_file("/models/chair/chair.obj").is_group());
        assert!(!Content::from_file("/models/chair/chair.obj").is_group());

        let source = ArchiveSource::new("/tmp/home.zip");
        assert!(Content::archive_entry(source.clone(), "3/chair.obj", true).is_group());
        assert!(!Content::archive_entry(source.clone(), "3", true).is_group());
        assert!(!Content::archive_entry(source, "3/chair.obj", false).is_group());
    }

    #[test]
    fn test_clone_shares_handle() {
        let a = Content::from_bytes("a", vec![0u8; 4]);
        let b = a.clone();
        let c = a.with_temporary(true);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_serde_uses_content_ref() {
        let content = Content::placeholder("2/chair.obj");
        let json = serde_json::to_string(&content).unwrap();
        assert_eq!(json, r#"{"kind":"placeholder","path":"2/chair.obj"}"#);

        let back: Content = serde_json::from_str(&json).unwrap();
        assert!(back.is_placeholder());

        let omitted: Content = serde_json::from_str(r#"{"kind":"omitted","name":"x"}"#).unwrap();
        assert!(matches!(omitted.locator(), Locator::Missing { .. }));
    }

    #[test]
    fn test_temporary_archive_source_is_deleted_with_last_handle() {
        let temp = tempfile::NamedTempFile::new().unwrap().into_temp_path();
        let path = temp.to_path_buf();
        let source = ArchiveSource::temporary(temp);
        let content = Content::archive_entry(source.clone(), "0", false);
        assert!(content.is_temporary());
        drop(source);
        assert!(path.exists());
        drop(content);
        assert!(!path.exists());
    }
}
