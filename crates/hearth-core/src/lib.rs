//! # Hearth Core
//!
//! Primitives shared by the Hearth persistence engine: content handles,
//! their digests, and the contract a document must satisfy to be saved.
//!
//! This crate knows nothing about the archive layout or the recovery
//! protocol. It only reads content.
//!
//! ## Key Types
//!
//! - [`Content`] - Shared handle on a byte stream (file, memory, archive entry)
//! - [`Digest`] - SHA-1 fingerprint with an invalid sentinel
//! - [`ContentDigests`] - Process-wide digest service with group handling
//! - [`Document`] - What the engine needs from a document graph
//! - [`Placeholder`] - Entry reference written in place of content
//!
//! ## Cancellation
//!
//! Every streaming loop checks a `CancellationToken` between chunks. See
//! [`cancel`].

pub mod cancel;
pub mod content;
pub mod digest;
pub mod document;
pub mod error;
pub mod identity;
pub mod placeholder;

pub use cancel::checkpoint;
pub use content::{ArchiveSource, Content, ContentRef, Locator};
pub use digest::{Digest, DigestHasher, DIGEST_LEN};
pub use document::{reachable_contents, Document};
pub use error::{CoreError, Result};
pub use identity::{is_significant_member, ContentDigests, ContentGroup, GroupMember};
pub use placeholder::Placeholder;

pub use tokio_util::sync::CancellationToken;
