//! # Hearth
//!
//! Persistence for furnished-home documents: archive storage with
//! deduplicated content, damage-tolerant reading and crash recovery.
//!
//! ## Overview
//!
//! A home is saved as a zip archive holding the document graph, one entry
//! per distinct piece of content, and a manifest of SHA-1 digests. Reading
//! checks every entry against the manifest, repairs archives with broken
//! entries, and substitutes damaged content from trusted catalogs when it
//! can. What cannot be recovered is reported, never silently dropped.
//!
//! ## Key Concepts
//!
//! - **Content**: a binary resource (icon, model, texture) referenced by
//!   the document. Multi-part content (a model with its textures) has one
//!   digest over all its significant members.
//! - **Manifest**: the `ContentDigests` entry; the ground truth for
//!   detecting corrupted entries.
//! - **Recovery file**: a background snapshot of an open home, locked by
//!   the process that owns it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use hearth::{CancellationToken, HomeStore, ReadOutcome, StoreConfig};
//! # use hearth_testkit::SampleHome;
//!
//! let store = HomeStore::new(StoreConfig::default());
//! let cancel = CancellationToken::new();
//!
//! match store.open::<SampleHome>(Path::new("house.sh3d"), &cancel).unwrap() {
//!     ReadOutcome::Damaged { invalid_contents, .. } => {
//!         eprintln!("damaged: {invalid_contents:?}");
//!     }
//!     outcome => {
//!         let home = outcome.into_document();
//!         store.save(&home, Path::new("copy.sh3d"), &cancel).unwrap();
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `hearth::core` - content identity and the document contract
//! - `hearth::archive` - container reader and writer
//! - `hearth::recovery` - auto-recovery scheduler

pub mod config;
pub mod error;
pub mod space;
pub mod store;

pub use hearth_archive as archive;
pub use hearth_core as core;
pub use hearth_recovery as recovery;

pub use config::StoreConfig;
pub use error::{HearthError, Result};
pub use store::HomeStore;

pub use hearth_archive::{
    CodecKind, CompositeSource, ContentLibrary, ContentPolicy, ReadOutcome, ReaderConfig, TrustedContentSource,
    WriteSummary, WriterConfig,
};
pub use hearth_core::{CancellationToken, Content, ContentDigests, Digest, Document};
pub use hearth_recovery::{AutoRecovery, DocumentKey, RecoveredDocument, RecoveryConfig, RecoveryEvent};
