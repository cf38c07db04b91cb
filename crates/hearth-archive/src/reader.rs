//! The container reader.
//!
//! ```text
//! Start -> StreamValidating -> Valid | NeedsRepair -> Repairing -> Parsing -> Clean | Repaired | Damaged
//! ```
//!
//! Damaged content never fails a read. The caller gets the document with
//! the list of references that could not be recovered and decides whether
//! to keep it.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use hearth_core::{cancel, ArchiveSource, CancellationToken, ContentDigests, CoreError, Document, Locator};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::codec::CodecKind;
use crate::error::{ArchiveError, Result};
use crate::resolution::ResolutionContext;
use crate::trusted::TrustedContentSource;
use crate::validate::{repair_archive, validate_archive};

/// Reader configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Document entry to read when both are present.
    pub preferred_codec: Option<CodecKind>,
    /// Use trusted copies of content even when the archive copy is valid.
    pub prefer_trusted_content: bool,
    /// Read from a private copy so the source file may be replaced or
    /// deleted while the document is open. On by default.
    pub copy_source: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            preferred_codec: None,
            prefer_trusted_content: false,
            copy_source: true,
        }
    }
}

impl ReaderConfig {
    pub fn with_preferred_codec(mut self, codec: CodecKind) -> Self {
        self.preferred_codec = Some(codec);
        self
    }

    pub fn with_prefer_trusted_content(mut self, prefer: bool) -> Self {
        self.prefer_trusted_content = prefer;
        self
    }

    pub fn with_copy_source(mut self, copy: bool) -> Self {
        self.copy_source = copy;
        self
    }
}

/// States of a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadPhase {
    Start,
    StreamValidating,
    Valid,
    NeedsRepair,
    Repairing,
    Parsing,
    Clean,
    Repaired,
    Damaged,
}

impl fmt::Display for ReadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadPhase::Start => "start",
            ReadPhase::StreamValidating => "stream-validating",
            ReadPhase::Valid => "valid",
            ReadPhase::NeedsRepair => "needs-repair",
            ReadPhase::Repairing => "repairing",
            ReadPhase::Parsing => "parsing",
            ReadPhase::Clean => "clean",
            ReadPhase::Repaired => "repaired",
            ReadPhase::Damaged => "damaged",
        };
        f.write_str(name)
    }
}

/// How a read ended.
#[derive(Debug)]
pub enum ReadOutcome<D> {
    /// Archive and content are intact.
    Clean(D),
    /// Entries were lost but the manifest proves every reference intact.
    Repaired(D),
    /// Some references could not be recovered.
    Damaged {
        document: D,
        invalid_contents: Vec<String>,
    },
}

impl<D> ReadOutcome<D> {
    pub fn document(&self) -> &D {
        match self {
            ReadOutcome::Clean(document) | ReadOutcome::Repaired(document) => document,
            ReadOutcome::Damaged { document, .. } => document,
        }
    }

    pub fn into_document(self) -> D {
        match self {
            ReadOutcome::Clean(document) | ReadOutcome::Repaired(document) => document,
            ReadOutcome::Damaged { document, .. } => document,
        }
    }

    pub fn phase(&self) -> ReadPhase {
        match self {
            ReadOutcome::Clean(_) => ReadPhase::Clean,
            ReadOutcome::Repaired(_) => ReadPhase::Repaired,
            ReadOutcome::Damaged { .. } => ReadPhase::Damaged,
        }
    }

    pub fn is_damaged(&self) -> bool {
        matches!(self, ReadOutcome::Damaged { .. })
    }

    /// References that could not be recovered. Empty unless damaged.
    pub fn invalid_contents(&self) -> &[String] {
        match self {
            ReadOutcome::Damaged { invalid_contents, .. } => invalid_contents,
            _ => &[],
        }
    }
}

/// Reads archives back into documents.
pub struct ArchiveReader {
    digests: Arc<ContentDigests>,
    config: ReaderConfig,
    trusted: Option<Arc<dyn TrustedContentSource>>,
}

impl ArchiveReader {
    pub fn new(digests: Arc<ContentDigests>, config: ReaderConfig) -> Self {
        Self {
            digests,
            config,
            trusted: None,
        }
    }

    /// Attach a source of known-good content.
    pub fn with_trusted_source(mut self, trusted: Arc<dyn TrustedContentSource>) -> Self {
        self.trusted = Some(trusted);
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read the archive at `path`.
    pub fn read<D: Document>(&self, path: &Path, cancel: &CancellationToken) -> Result<ReadOutcome<D>> {
        trace_phase(path, ReadPhase::Start);
        trace_phase(path, ReadPhase::StreamValidating);
        let validation = validate_archive(path, cancel)?;

        let source = if validation.fully_valid {
            trace_phase(path, ReadPhase::Valid);
            if self.config.copy_source {
                copy_to_temporary(path, cancel)?
            } else {
                ArchiveSource::new(path)
            }
        } else {
            warn!(
                path = %path.display(),
                phase = %ReadPhase::NeedsRepair,
                dropped = ?validation.dropped,
                "archive has unreadable entries"
            );
            trace_phase(path, ReadPhase::Repairing);
            repair_archive(path, &validation, cancel)?
        };

        trace_phase(path, ReadPhase::Parsing);
        let mut document: D = self.decode_document(&source, path, cancel)?;
        let context = ResolutionContext::new(
            source,
            self.digests.clone(),
            self.trusted.clone(),
            self.config.prefer_trusted_content,
            cancel.clone(),
        )?;

        let mut failure: Option<ArchiveError> = None;
        document.replace_contents(&mut |content| {
            if failure.is_some() {
                return content.clone();
            }
            match content.locator() {
                Locator::Placeholder { path } => context.resolve(path).unwrap_or_else(|e| {
                    failure = Some(e);
                    content.clone()
                }),
                _ => content.clone(),
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let outcome = if !validation.fully_valid || context.contains_invalid_content() {
            if context.fully_checked_and_clean() {
                ReadOutcome::Repaired(document)
            } else {
                ReadOutcome::Damaged {
                    document,
                    invalid_contents: context.invalid_contents(),
                }
            }
        } else {
            ReadOutcome::Clean(document)
        };
        match &outcome {
            ReadOutcome::Clean(_) => trace_phase(path, ReadPhase::Clean),
            outcome => warn!(
                path = %path.display(),
                phase = %outcome.phase(),
                invalid = outcome.invalid_contents().len(),
                "archive read with damage"
            ),
        }
        Ok(outcome)
    }

    fn decode_document<D: Document>(
        &self,
        source: &ArchiveSource,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<D> {
        let mut zip = source.open_zip()?;
        let codec = self.select_codec(&zip, path)?;
        let mut data = Vec::new();
        {
            let mut entry = zip
                .by_name(codec.entry_name())
                .map_err(|e| CoreError::from_zip(source.path(), e))?;
            cancel::copy(&mut entry, &mut data, cancel)?;
        }
        debug!(path = %path.display(), codec = ?codec, bytes = data.len(), "decoding document entry");
        codec.decode(data.as_slice())
    }

    fn select_codec(&self, zip: &ZipArchive<File>, path: &Path) -> Result<CodecKind> {
        let present = |codec: CodecKind| zip.index_for_name(codec.entry_name()).is_some();
        self.config
            .preferred_codec
            .into_iter()
            .chain([CodecKind::Binary, CodecKind::Xml])
            .find(|&codec| present(codec))
            .ok_or_else(|| ArchiveError::MissingDocumentEntry {
                archive: path.display().to_string(),
            })
    }
}

fn trace_phase(path: &Path, phase: ReadPhase) {
    debug!(path = %path.display(), phase = %phase, "read phase");
}

fn copy_to_temporary(path: &Path, cancel: &CancellationToken) -> Result<Arc<ArchiveSource>> {
    let mut temp = tempfile::Builder::new()
        .prefix("hearth-copy-")
        .suffix(".zip")
        .tempfile()?;
    cancel::copy(&mut File::open(path)?, temp.as_file_mut(), cancel)?;
    Ok(ArchiveSource::temporary(temp.into_temp_path()))
}
