//! The content digest manifest.
//!
//! Stored in the archive entry [`MANIFEST_ENTRY`] as line-oriented records:
//!
//! ```text
//! ContentDigests-Version: 1.0
//!
//! Name: 0
//! SHA-1-Digest: qZk+NkcGgWq6PiVxeFDCbJzQ2J0=
//!
//! Name: 1/chair.obj
//! SHA-1-Digest: ...
//! ```
//!
//! Members of a multi-part group are recorded with their group digest.

use std::collections::HashMap;

use hearth_core::Digest;

use crate::error::{ArchiveError, Result};

/// Name of the manifest entry.
pub const MANIFEST_ENTRY: &str = "ContentDigests";

const VERSION_KEY: &str = "ContentDigests-Version";
const VERSION: &str = "1.0";
const NAME_KEY: &str = "Name";
const DIGEST_KEY: &str = "SHA-1-Digest";

/// Ordered (entry name, digest) records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    records: Vec<(String, Digest)>,
    index: HashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. A name already present keeps its first digest.
    pub fn push(&mut self, name: impl Into<String>, digest: Digest) {
        let name = name.into();
        if self.index.contains_key(&name) {
            return;
        }
        self.index.insert(name.clone(), self.records.len());
        self.records.push((name, digest));
    }

    /// The digest recorded for `name`.
    pub fn get(&self, name: &str) -> Option<Digest> {
        self.index.get(name).map(|&i| self.records[i].1)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Digest)> {
        self.records.iter().map(|(name, digest)| (name.as_str(), digest))
    }

    /// Serialize in insertion order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("{VERSION_KEY}: {VERSION}\n");
        for (name, digest) in &self.records {
            out.push('\n');
            out.push_str(&format!("{NAME_KEY}: {name}\n"));
            out.push_str(&format!("{DIGEST_KEY}: {}\n", digest.to_base64()));
        }
        out.into_bytes()
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|e| ArchiveError::MalformedManifest(e.to_string()))?;
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));

        let header = lines
            .by_ref()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ArchiveError::MalformedManifest("empty manifest".into()))?;
        match split_record(header) {
            Some((VERSION_KEY, VERSION)) => {}
            Some((VERSION_KEY, other)) => return Err(ArchiveError::UnsupportedManifestVersion(other.to_string())),
            _ => return Err(ArchiveError::MalformedManifest(format!("unexpected header {header:?}"))),
        }

        let mut manifest = Manifest::new();
        let mut pending_name: Option<String> = None;
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            match split_record(line) {
                Some((NAME_KEY, name)) => {
                    if let Some(name) = pending_name.replace(name.to_string()) {
                        return Err(ArchiveError::MalformedManifest(format!("no digest for {name}")));
                    }
                }
                Some((DIGEST_KEY, value)) => {
                    let name = pending_name
                        .take()
                        .ok_or_else(|| ArchiveError::MalformedManifest("digest without name".into()))?;
                    let digest = Digest::from_base64(value).map_err(|e| ArchiveError::MalformedManifest(e.to_string()))?;
                    manifest.push(name, digest);
                }
                // Unknown attributes are skipped.
                Some(_) => {}
                None => return Err(ArchiveError::MalformedManifest(format!("unexpected line {line:?}"))),
            }
        }
        if let Some(name) = pending_name {
            return Err(ArchiveError::MalformedManifest(format!("no digest for {name}")));
        }
        Ok(manifest)
    }
}

fn split_record(line: &str) -> Option<(&str, &str)> {
    line.split_once(':').map(|(key, value)| (key.trim(), value.trim()))
}
