//! The container writer.
//!
//! Entry order is fixed: the document entry first, then the manifest (when
//! any content is stored), then content entries in placeholder order.

use std::collections::HashMap;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;

use hearth_core::{
    cancel, reachable_contents, CancellationToken, Content, ContentDigests, Digest, Document, Locator, Placeholder,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::codec::CodecKind;
use crate::error::{ArchiveError, Result};
use crate::manifest::{Manifest, MANIFEST_ENTRY};

/// Which reachable content is stored in the archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPolicy {
    /// Every reachable content.
    #[default]
    All,
    /// Only freshly imported content; durable files stay referenced.
    TemporaryOnly,
    /// Structure only.
    None,
}

impl ContentPolicy {
    pub fn includes(self, content: &Content) -> bool {
        match self {
            ContentPolicy::All => true,
            ContentPolicy::TemporaryOnly => content.is_temporary(),
            ContentPolicy::None => false,
        }
    }
}

/// Writer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Encoding of the document entry.
    pub codec: CodecKind,
    /// Deflate level, 0 (stored) to 9.
    pub compression_level: u32,
    pub content_policy: ContentPolicy,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::Binary,
            compression_level: 0,
            content_policy: ContentPolicy::All,
        }
    }
}

impl WriterConfig {
    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_content_policy(mut self, policy: ContentPolicy) -> Self {
        self.content_policy = policy;
        self
    }
}

/// What a write produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Entries in the archive, document and manifest included.
    pub entries: usize,
    /// Distinct contents stored.
    pub contents: usize,
    pub manifest_records: usize,
}

/// One distinct content and the entries it expands to.
struct PlannedContent {
    digest: Digest,
    entries: Vec<(String, Content)>,
}

struct Plan {
    contents: Vec<PlannedContent>,
    assignments: HashMap<usize, Placeholder>,
}

/// Serializes documents and their content into archives.
pub struct ArchiveWriter {
    digests: Arc<ContentDigests>,
    config: WriterConfig,
}

impl ArchiveWriter {
    pub fn new(digests: Arc<ContentDigests>, config: WriterConfig) -> Self {
        Self { digests, config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write `document` as an archive into `dest`.
    ///
    /// The document itself is not modified. On error `dest` holds a
    /// partial archive the caller must discard.
    pub fn write<D, W>(&self, document: &D, dest: W, cancel: &CancellationToken) -> Result<WriteSummary>
    where
        D: Document,
        W: Write + Seek,
    {
        let plan = self.plan(document, cancel)?;

        let mut substituted = document.clone();
        substituted.replace_contents(&mut |content| match plan.assignments.get(&content.handle_id()) {
            Some(placeholder) => Content::placeholder(placeholder.entry_name()),
            None => content.clone(),
        });

        let options = self.file_options();
        let mut zip = ZipWriter::new(dest);
        let mut summary = WriteSummary {
            contents: plan.contents.len(),
            ..WriteSummary::default()
        };

        zip.start_file(self.config.codec.entry_name(), options)
            .map_err(write_error)?;
        self.config.codec.encode(&substituted, &mut zip)?;
        summary.entries += 1;

        let mut manifest = Manifest::new();
        for planned in &plan.contents {
            for (name, _) in &planned.entries {
                manifest.push(name.clone(), planned.digest);
            }
        }
        if !manifest.is_empty() {
            zip.start_file(MANIFEST_ENTRY, options).map_err(write_error)?;
            zip.write_all(&manifest.to_bytes())?;
            summary.entries += 1;
            summary.manifest_records = manifest.len();
        }

        for planned in &plan.contents {
            for (name, content) in &planned.entries {
                cancel::checkpoint(cancel)?;
                zip.start_file(name.as_str(), options).map_err(write_error)?;
                cancel::copy(&mut content.open(cancel)?, &mut zip, cancel)?;
                summary.entries += 1;
            }
        }

        zip.finish().map_err(write_error)?;
        debug!(
            entries = summary.entries,
            contents = summary.contents,
            manifest_records = summary.manifest_records,
            "archive written"
        );
        Ok(summary)
    }

    /// Write to a temporary sibling of `path`, then rename it over `path`.
    pub fn write_to_path<D: Document>(
        &self,
        document: &D,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<WriteSummary> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".hearth-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        let summary = self.write(document, temp.as_file_mut(), cancel)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ArchiveError::from(e.error))?;
        Ok(summary)
    }

    /// Assign a placeholder to every stored content, deduplicating by digest.
    fn plan<D: Document>(&self, document: &D, cancel: &CancellationToken) -> Result<Plan> {
        let mut contents: Vec<PlannedContent> = Vec::new();
        let mut assignments = HashMap::new();
        let mut by_digest: HashMap<(Digest, bool), usize> = HashMap::new();

        for content in reachable_contents(document) {
            if assignments.contains_key(&content.handle_id())
                || !is_storable(&content)
                || !self.config.content_policy.includes(&content)
            {
                continue;
            }
            let is_group = content.is_group();
            let digest = self.digests.try_digest(&content, cancel)?;
            let group = self.digests.group_members(&content, cancel)?;

            let index = match by_digest.get(&(digest, is_group)) {
                Some(&index) => index,
                None => {
                    let index = contents.len();
                    let entries = if is_group {
                        let prefix = Placeholder::single(index).group_prefix();
                        group
                            .members
                            .iter()
                            .map(|member| (format!("{prefix}{}", member.name), member.content.clone()))
                            .collect()
                    } else {
                        vec![(Placeholder::single(index).entry_name(), content.clone())]
                    };
                    contents.push(PlannedContent { digest, entries });
                    by_digest.insert((digest, is_group), index);
                    index
                }
            };

            let placeholder = if is_group {
                Placeholder::member(index, group.principal)
            } else {
                Placeholder::single(index)
            };
            assignments.insert(content.handle_id(), placeholder);
        }

        Ok(Plan { contents, assignments })
    }

    fn file_options(&self) -> SimpleFileOptions {
        let level = self.config.compression_level.min(9);
        if level == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level)))
        }
    }
}

fn is_storable(content: &Content) -> bool {
    !matches!(content.locator(), Locator::Placeholder { .. } | Locator::Missing { .. })
}

fn write_error(error: ZipError) -> ArchiveError {
    match error {
        ZipError::Io(e) => e.into(),
        other => ArchiveError::Encoding(other.to_string()),
    }
}
