//! Content identity.
//!
//! [`ContentDigests`] is the process-wide digest service. It fingerprints
//! content, memoizes the result per handle, and treats multi-part
//! resources as one unit: the digest of a group member covers every
//! significant sibling of its group, hashed in lexicographic name order.
//!
//! One instance is created per process and passed explicitly to readers,
//! writers and the recovery scheduler.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use crate::cancel;
use crate::content::{ArchiveSource, Content, ContentInner, Locator};
use crate::digest::{Digest, DigestHasher};
use crate::error::{CoreError, Result};

/// Group members never taken into account.
const EXCLUDED_MEMBERS: &[&str] = &["LICENSE.TXT"];

/// Cache size above which dead handles are swept.
const MIN_PRUNE_THRESHOLD: usize = 256;

/// Archive listings kept before the listing cache is reset.
const MAX_LISTINGS: usize = 64;

/// Whether the group member `name` contributes to its group.
pub fn is_significant_member(name: &str) -> bool {
    if name.is_empty() || name.ends_with('/') {
        return false;
    }
    let file_name = name.rsplit('/').next().unwrap_or(name);
    !EXCLUDED_MEMBERS
        .iter()
        .any(|excluded| file_name.eq_ignore_ascii_case(excluded))
}

/// One significant member of a content group.
#[derive(Clone, Debug)]
pub struct GroupMember {
    /// Path relative to the group root, `/`-separated.
    pub name: String,
    pub content: Content,
}

/// The significant members of the group a content belongs to.
#[derive(Clone, Debug)]
pub struct ContentGroup {
    /// Relative name of the content the group was resolved from.
    pub principal: String,
    /// Members sorted by name.
    pub members: Vec<GroupMember>,
}

struct CachedDigest {
    content: Weak<ContentInner>,
    digest: Digest,
}

struct DigestCache {
    entries: HashMap<usize, CachedDigest>,
    prune_at: usize,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ListingKey {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

/// Process-wide content digest service.
pub struct ContentDigests {
    cache: Mutex<DigestCache>,
    listings: Mutex<HashMap<ListingKey, Arc<Vec<String>>>>,
}

impl ContentDigests {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(DigestCache {
                entries: HashMap::new(),
                prune_at: MIN_PRUNE_THRESHOLD,
            }),
            listings: Mutex::new(HashMap::new()),
        }
    }

    /// The digest of `content`, or [`Digest::INVALID`] if it is unreadable.
    pub fn digest(&self, content: &Content) -> Digest {
        match self.try_digest(content, &CancellationToken::new()) {
            Ok(digest) => digest,
            Err(e) => {
                debug!(content = ?content, error = %e, "content digest unavailable");
                Digest::INVALID
            }
        }
    }

    /// The digest of `content`, surfacing read failures and interruption.
    pub fn try_digest(&self, content: &Content, cancel: &CancellationToken) -> Result<Digest> {
        if let Some(digest) = self.cached(content) {
            return Ok(digest);
        }
        let digest = self.compute(content, cancel)?;
        self.remember(content, digest);
        Ok(digest)
    }

    /// Whether two contents are interchangeable for storage.
    ///
    /// False whenever either side is unreadable.
    pub fn equal(&self, a: &Content, b: &Content) -> bool {
        let first = self.digest(a);
        if !first.is_valid() {
            return false;
        }
        first.matches(&self.digest(b))
    }

    /// Resolve the significant members of the group `content` belongs to.
    ///
    /// Content that is not a group member yields a single member named
    /// after the content itself.
    pub fn group_members(&self, content: &Content, cancel: &CancellationToken) -> Result<ContentGroup> {
        if !content.is_group() {
            return Ok(ContentGroup {
                principal: content.name().to_string(),
                members: vec![GroupMember {
                    name: content.name().to_string(),
                    content: content.clone(),
                }],
            });
        }
        match content.locator() {
            Locator::File { path } => file_group(path, content.is_temporary(), cancel),
            Locator::ArchiveEntry { archive, entry } => self.archive_group(archive, entry),
            _ => Err(CoreError::Unreadable(format!("{content:?} is not a group"))),
        }
    }

    /// Drop the memoized digest of `content`.
    pub fn forget(&self, content: &Content) {
        lock(&self.cache).entries.remove(&content.handle_id());
    }

    /// Drop every memoized digest and archive listing.
    pub fn clear(&self) {
        let mut cache = lock(&self.cache);
        cache.entries.clear();
        cache.prune_at = MIN_PRUNE_THRESHOLD;
        lock(&self.listings).clear();
    }

    /// Number of memoized digests whose handle is still alive.
    pub fn cached_len(&self) -> usize {
        lock(&self.cache)
            .entries
            .values()
            .filter(|cached| cached.content.strong_count() > 0)
            .count()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn cached(&self, content: &Content) -> Option<Digest> {
        let cache = lock(&self.cache);
        // The weak reference pins the allocation, so the address key cannot
        // be reused while the entry exists.
        cache
            .entries
            .get(&content.handle_id())
            .filter(|cached| cached.content.strong_count() > 0)
            .map(|cached| cached.digest)
    }

    fn remember(&self, content: &Content, digest: Digest) {
        let mut cache = lock(&self.cache);
        if cache.entries.len() >= cache.prune_at {
            cache.entries.retain(|_, cached| cached.content.strong_count() > 0);
            cache.prune_at = (cache.entries.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }
        cache.entries.insert(
            content.handle_id(),
            CachedDigest {
                content: content.downgrade(),
                digest,
            },
        );
    }

    fn compute(&self, content: &Content, cancel: &CancellationToken) -> Result<Digest> {
        let mut hasher = DigestHasher::new();
        if content.is_group() {
            let group = self.group_members(content, cancel)?;
            for member in &group.members {
                cancel::copy(&mut member.content.open(cancel)?, &mut hasher, cancel)?;
            }
        } else {
            cancel::copy(&mut content.open(cancel)?, &mut hasher, cancel)?;
        }
        Ok(hasher.finalize())
    }

    fn archive_group(&self, archive: &Arc<ArchiveSource>, entry: &str) -> Result<ContentGroup> {
        let split = entry.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (prefix, principal) = entry.split_at(split);
        let listing = self.listing(archive)?;
        let members = listing
            .iter()
            .filter_map(|name| name.strip_prefix(prefix).map(|relative| (name, relative)))
            .filter(|(_, relative)| is_significant_member(relative))
            .map(|(name, relative)| GroupMember {
                name: relative.to_string(),
                content: Content::archive_entry(archive.clone(), name.clone(), false),
            })
            .collect();
        Ok(ContentGroup {
            principal: principal.to_string(),
            members,
        })
    }

    /// Sorted file entry names of `archive`, shared by every handle on it.
    fn listing(&self, archive: &ArchiveSource) -> Result<Arc<Vec<String>>> {
        let metadata = fs::metadata(archive.path())?;
        let key = ListingKey {
            path: archive.path().to_path_buf(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        };
        if let Some(listing) = lock(&self.listings).get(&key) {
            return Ok(listing.clone());
        }

        let zip = archive.open_zip()?;
        let mut names: Vec<String> = zip
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        let listing = Arc::new(names);

        let mut listings = lock(&self.listings);
        if listings.len() >= MAX_LISTINGS {
            listings.clear();
        }
        listings.insert(key, listing.clone());
        Ok(listing)
    }
}

impl Default for ContentDigests {
    fn default() -> Self {
        Self::new()
    }
}

fn file_group(principal: &Path, temporary: bool, cancel: &CancellationToken) -> Result<ContentGroup> {
    let root = principal
        .parent()
        .ok_or_else(|| CoreError::Unreadable(format!("{} has no parent directory", principal.display())))?;
    let mut members = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        cancel::checkpoint(cancel)?;
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = relative_name(root, entry.path());
        if is_significant_member(&name) {
            members.push(GroupMember {
                name,
                content: Content::new(
                    Locator::File {
                        path: entry.path().to_path_buf(),
                    },
                    false,
                    temporary,
                ),
            });
        }
    }
    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ContentGroup {
        principal: relative_name(root, principal),
        members,
    })
}

fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_group(dir: &Path, files: &[(&str, &[u8])]) {
        for (name, data) in files {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
    }

    #[test]
    fn test_significant_members() {
        assert!(is_significant_member("chair.obj"));
        assert!(is_significant_member("textures/wood.png"));
        assert!(!is_significant_member("LICENSE.TXT"));
        assert!(!is_significant_member("license.txt"));
        assert!(!is_significant_member("sub/License.Txt"));
        assert!(!is_significant_member("textures/"));
        assert!(is_significant_member("LICENSE.TXT.bak"));
    }

    #[test]
    fn test_plain_digest_matches_hash() {
        let digests = ContentDigests::new();
        let content = Content::from_bytes("a", b"abc".to_vec());
        assert_eq!(digests.digest(&content), Digest::hash(b"abc"));
    }

    #[test]
    fn test_digest_is_memoized_per_handle() {
        let digests = ContentDigests::new();
        let content = Content::from_bytes("a", b"abc".to_vec());
        let first = digests.digest(&content);
        assert_eq!(digests.cached_len(), 1);
        assert_eq!(digests.digest(&content.clone()), first);
        assert_eq!(digests.cached_len(), 1);

        digests.forget(&content);
        assert_eq!(digests.cached_len(), 0);
        drop(content);
        assert_eq!(digests.cached_len(), 0);
    }

    #[test]
    fn test_equal_compares_digests_not_handles() {
        let digests = ContentDigests::new();
        let a = Content::from_bytes("a", vec![9u8; 100]);
        let b = Content::from_bytes("b", vec![9u8; 100]);
        let c = Content::from_bytes("c", vec![8u8; 100]);
        assert!(digests.equal(&a, &b));
        assert!(!digests.equal(&a, &c));
    }

    #[test]
    fn test_unreadable_content_is_never_equal() {
        let digests = ContentDigests::new();
        let missing = Content::missing("gone");
        assert_eq!(digests.digest(&missing), Digest::INVALID);
        assert!(!digests.equal(&missing, &missing));
        assert!(!digests.equal(&missing, &Content::from_file("/definitely/not/here")));
    }

    #[test]
    fn test_group_digest_spans_siblings() {
        let dir = tempfile::tempdir().unwrap();
        write_group(
            dir.path(),
            &[
                ("chair.obj", b"v 0 0 0"),
                ("chair.mtl", b"newmtl wood"),
                ("textures/wood.png", b"PNG"),
            ],
        );
        let digests = ContentDigests::new();
        let chair = Content::multi_part_file(dir.path().join("chair.obj"));

        let group = digests.group_members(&chair, &CancellationToken::new()).unwrap();
        assert_eq!(group.principal, "chair.obj");
        let names: Vec<_> = group.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["chair.mtl", "chair.obj", "textures/wood.png"]);

        let expected = Digest::hash(b"newmtl woodv 0 0 0PNG");
        assert_eq!(digests.digest(&chair), expected);
    }

    #[test]
    fn test_group_digest_changes_with_members_but_not_license() {
        let dir = tempfile::tempdir().unwrap();
        write_group(dir.path(), &[("lamp.obj", b"lamp"), ("lamp.mtl", b"mtl")]);
        let principal = dir.path().join("lamp.obj");
        let base = ContentDigests::new().digest(&Content::multi_part_file(&principal));

        write_group(dir.path(), &[("LICENSE.TXT", b"all rights reserved")]);
        let with_license = ContentDigests::new().digest(&Content::multi_part_file(&principal));
        assert_eq!(base, with_license);

        write_group(dir.path(), &[("lamp.mtl", b"mtl changed")]);
        let changed = ContentDigests::new().digest(&Content::multi_part_file(&principal));
        assert_ne!(base, changed);
    }

    #[test]
    fn test_archive_group_matches_file_group() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model");
        fs::create_dir(&model).unwrap();
        write_group(&model, &[("sofa.obj", b"sofa"), ("sofa.mtl", b"fabric")]);

        let archive_path = dir.path().join("home.zip");
        let mut zip = zip::ZipWriter::new(fs::File::create(&archive_path).unwrap());
        let options = SimpleFileOptions::default();
        zip.add_directory("0/", options).unwrap();
        for (name, data) in [
            ("Home", &b"doc"[..]),
            ("0/LICENSE.TXT", &b"license"[..]),
            ("0/sofa.mtl", &b"fabric"[..]),
            ("0/sofa.obj", &b"sofa"[..]),
            ("1", &b"other"[..]),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();

        let digests = ContentDigests::new();
        let source = ArchiveSource::new(&archive_path);
        let entry = Content::archive_entry(source, "0/sofa.obj", true);
        let group = digests.group_members(&entry, &CancellationToken::new()).unwrap();
        assert_eq!(group.principal, "sofa.obj");
        assert_eq!(group.members.len(), 2);

        let file = Content::multi_part_file(model.join("sofa.obj"));
        assert!(digests.equal(&entry, &file));
    }

    #[test]
    fn test_cancelled_digest_is_not_cached() {
        let digests = ContentDigests::new();
        let content = Content::from_bytes("a", vec![1u8; 10]);
        let token = CancellationToken::new();
        token.cancel();
        let err = digests.try_digest(&content, &token).unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(digests.cached_len(), 0);
    }
}
