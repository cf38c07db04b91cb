//! # Hearth Testkit
//!
//! Testing utilities for Hearth.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Sample document**: [`SampleHome`], a small home graph implementing
//!   [`hearth_core::Document`]
//! - **Fixtures**: a scratch directory with content helpers
//! - **Generators**: Proptest strategies for property-based testing
//! - **Vectors**: known digests and manifest text
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use hearth_testkit::generators::{home_from_params, HomeParams};
//!
//! proptest! {
//!     #[test]
//!     fn duplicated_blobs_are_stored_once(params: HomeParams) {
//!         let home = home_from_params(&params);
//!         // write it and count entries
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use hearth_testkit::HomeFixture;
//!
//! let fixture = HomeFixture::new();
//! let model = fixture.model_dir("chair", &[("chair.obj", b"v 0 0 0"), ("chair.mtl", b"newmtl")]);
//! assert!(model.is_group());
//! ```

pub mod fixtures;
pub mod generators;
pub mod home;
pub mod vectors;

pub use fixtures::{init_tracing, HomeFixture};
pub use generators::{home_from_params, HomeParams};
pub use home::{Piece, SampleHome, Wall};
pub use vectors::{all_vectors, verify_all_vectors, DigestVector};
