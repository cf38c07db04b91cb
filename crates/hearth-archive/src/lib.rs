//! # Hearth Archive
//!
//! The container format for Hearth documents: a zip archive holding the
//! serialized document, one entry per distinct content, and a manifest of
//! content digests.
//!
//! ## Overview
//!
//! [`ArchiveWriter`] replaces every reachable content by a placeholder,
//! deduplicating by digest, and stores each distinct content once.
//! [`ArchiveReader`] validates the archive, repairs it into a temporary
//! copy when entries are unreadable, parses the document and resolves
//! placeholders through a [`ResolutionContext`].
//!
//! ## Key Types
//!
//! - [`ArchiveWriter`] / [`WriterConfig`] / [`ContentPolicy`]
//! - [`ArchiveReader`] / [`ReaderConfig`] / [`ReadOutcome`]
//! - [`Manifest`] - Entry name to digest records
//! - [`CodecKind`] - Binary (CBOR) or XML document entry
//! - [`TrustedContentSource`] - Known-good content used as fallback
//!
//! ## Archive Layout
//!
//! | entry | content |
//! |---|---|
//! | `Home` or `Home.xml` | the document, content fields as placeholders |
//! | `ContentDigests` | manifest, present when content is stored |
//! | `0`, `1`, ... | single-file content |
//! | `2/model.obj`, `2/model.mtl`, ... | members of a multi-part content |
//!
//! ## Design Notes
//!
//! - **Damage is data**: unreadable content yields [`ReadOutcome::Damaged`], not an error
//! - **No half-written files**: [`ArchiveWriter::write_to_path`] renames a complete temporary file
//! - **Interruption**: every streaming loop observes a `CancellationToken`

pub mod codec;
pub mod error;
pub mod manifest;
pub mod reader;
pub mod resolution;
pub mod trusted;
pub mod validate;
pub mod writer;
mod xml;

pub use codec::{BinaryCodec, CodecKind, DocumentCodec, XmlCodec, BINARY_ENTRY, XML_ENTRY};
pub use error::{ArchiveError, Result};
pub use manifest::{Manifest, MANIFEST_ENTRY};
pub use reader::{ArchiveReader, ReadOutcome, ReadPhase, ReaderConfig};
pub use resolution::ResolutionContext;
pub use trusted::{CompositeSource, ContentLibrary, TrustedContentSource};
pub use validate::{repair_archive, validate_archive, ArchiveValidation};
pub use writer::{ArchiveWriter, ContentPolicy, WriteSummary, WriterConfig};
