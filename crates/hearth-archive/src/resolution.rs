//! Content resolution while reading an archive.
//!
//! A [`ResolutionContext`] turns each placeholder of a parsed document back
//! into content. The archive's manifest is loaded when the context is
//! built, before any placeholder is resolved.
//!
//! A trusted source replaces archive content in two cases: always when the
//! archive copy is unreadable or does not match its manifest digest, and
//! for valid copies only when `prefer_trusted` is set.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hearth_core::{cancel, ArchiveSource, CancellationToken, Content, ContentDigests, CoreError, Digest, Placeholder};
use tracing::{debug, warn};

use crate::error::Result;
use crate::manifest::{Manifest, MANIFEST_ENTRY};
use crate::trusted::TrustedContentSource;

#[derive(Default)]
struct ResolutionState {
    resolved: HashMap<String, Content>,
    invalid: Vec<String>,
    unchecked: usize,
    contains_invalid: bool,
}

/// Per-read placeholder resolver.
pub struct ResolutionContext {
    source: Arc<ArchiveSource>,
    digests: Arc<ContentDigests>,
    trusted: Option<Arc<dyn TrustedContentSource>>,
    prefer_trusted: bool,
    cancel: CancellationToken,
    manifest: Option<Manifest>,
    entries: HashSet<String>,
    state: Mutex<ResolutionState>,
}

impl ResolutionContext {
    /// Build a context for `source`, reading its manifest if present.
    pub fn new(
        source: Arc<ArchiveSource>,
        digests: Arc<ContentDigests>,
        trusted: Option<Arc<dyn TrustedContentSource>>,
        prefer_trusted: bool,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut zip = source.open_zip()?;
        let entries: HashSet<String> = zip.file_names().map(str::to_string).collect();
        let manifest = if entries.contains(MANIFEST_ENTRY) {
            let mut data = Vec::new();
            let mut entry = zip
                .by_name(MANIFEST_ENTRY)
                .map_err(|e| CoreError::from_zip(source.path(), e))?;
            cancel::copy(&mut entry, &mut data, &cancel)?;
            let manifest = Manifest::parse(&data)?;
            debug!(records = manifest.len(), "manifest loaded");
            Some(manifest)
        } else {
            None
        };

        Ok(Self {
            source,
            digests,
            trusted,
            prefer_trusted,
            cancel,
            manifest,
            entries,
            state: Mutex::new(ResolutionState::default()),
        })
    }

    /// Resolve a placeholder path to content.
    ///
    /// Never fails on damaged content: an entry that cannot be recovered
    /// is recorded as invalid and resolved to a missing content. Only
    /// interruption is returned as an error.
    pub fn resolve(&self, path: &str) -> Result<Content> {
        if let Some(content) = self.lock().resolved.get(path) {
            return Ok(content.clone());
        }
        let content = self.resolve_uncached(path)?;
        let mut state = self.lock();
        let content = state.resolved.entry(path.to_string()).or_insert(content).clone();
        Ok(content)
    }

    fn resolve_uncached(&self, path: &str) -> Result<Content> {
        let multi_part = match Placeholder::parse(path) {
            Ok(placeholder) => placeholder.sub_path.is_some(),
            Err(e) => {
                warn!(placeholder = %path, error = %e, "malformed content reference");
                return Ok(self.invalid(path, None));
            }
        };
        let content = Content::archive_entry(self.source.clone(), path, multi_part);
        let expected = self.manifest.as_ref().and_then(|manifest| manifest.get(path));

        let actual = if self.entries.contains(path) {
            match self.digests.try_digest(&content, &self.cancel) {
                Ok(digest) => Some(digest),
                Err(e) if e.is_interrupted() => return Err(e.into()),
                Err(e) => {
                    debug!(entry = %path, error = %e, "content entry unreadable");
                    None
                }
            }
        } else {
            None
        };

        let Some(actual) = actual else {
            return Ok(self.invalid(path, expected));
        };
        match expected {
            Some(expected) if !expected.matches(&actual) => {
                warn!(entry = %path, expected = %expected, actual = %actual, "content digest mismatch");
                return Ok(self.invalid(path, Some(expected)));
            }
            None if self.manifest.is_some() => self.lock().unchecked += 1,
            _ => {}
        }

        if self.prefer_trusted {
            if let Some(trusted) = self.find_trusted(&actual) {
                debug!(entry = %path, "using trusted copy of valid content");
                return Ok(trusted);
            }
        }
        Ok(content)
    }

    /// Record `path` as damaged and substitute trusted content if possible.
    fn invalid(&self, path: &str, expected: Option<Digest>) -> Content {
        let substitute = expected.and_then(|digest| self.find_trusted(&digest));
        let mut state = self.lock();
        state.contains_invalid = true;
        match substitute {
            Some(content) => {
                debug!(entry = %path, "damaged content replaced from trusted source");
                content
            }
            None => {
                if !state.invalid.iter().any(|p| p == path) {
                    state.invalid.push(path.to_string());
                }
                Content::missing(path)
            }
        }
    }

    fn find_trusted(&self, digest: &Digest) -> Option<Content> {
        self.trusted
            .as_ref()
            .and_then(|trusted| trusted.find(digest, &self.digests))
    }

    /// Whether any referenced entry was unreadable or mismatched.
    pub fn contains_invalid_content(&self) -> bool {
        self.lock().contains_invalid
    }

    /// References that could not be resolved nor substituted.
    pub fn invalid_contents(&self) -> Vec<String> {
        self.lock().invalid.clone()
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// A manifest existed and every reference was verified against it.
    pub fn fully_checked_and_clean(&self) -> bool {
        let state = self.lock();
        self.manifest.is_some() && state.invalid.is_empty() && state.unchecked == 0
    }

    fn lock(&self) -> MutexGuard<'_, ResolutionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
