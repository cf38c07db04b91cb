//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hearth_core::{Content, ContentDigests};
use tempfile::TempDir;

use crate::home::SampleHome;

/// A scratch directory and a digest service.
pub struct HomeFixture {
    dir: TempDir,
    pub digests: Arc<ContentDigests>,
}

impl HomeFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create fixture directory"),
            digests: Arc::new(ContentDigests::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// A path inside the fixture directory. Nothing is created.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file, creating parent directories.
    pub fn write_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, data).expect("write fixture file");
        path
    }

    /// A multi-part model stored in `models/<name>/`. The first file is
    /// the principal.
    pub fn model_dir(&self, name: &str, files: &[(&str, &[u8])]) -> Content {
        let mut principal = None;
        for (file, data) in files {
            let path = self.write_file(&format!("models/{name}/{file}"), data);
            principal.get_or_insert(path);
        }
        Content::multi_part_file(principal.expect("model needs at least one file"))
    }

    /// Deterministic bytes; distinct seeds below 256 give distinct blobs.
    pub fn blob(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    /// A home with imported icons, a shared texture and a multi-part model.
    pub fn sample_home(&self) -> SampleHome {
        let mut home = SampleHome::named("Sample");
        home.add_wall(0.0, 0.0, 500.0, 0.0);
        home.add_wall(500.0, 0.0, 500.0, 400.0);

        let shared = HomeFixture::blob(100, 7);
        let chair = self.model_dir("chair", &[("chair.obj", b"v 0 0 0\nf 1 1 1"), ("chair.mtl", b"newmtl oak")]);
        home.add_piece("Chair", Content::from_bytes("chair.png", shared.clone()), chair);
        home.add_piece(
            "Table",
            Content::from_bytes("table.png", shared),
            Content::from_bytes("table.obj", HomeFixture::blob(300, 9)),
        );
        home.set_background(Content::from_file(self.write_file("plan.jpg", &HomeFixture::blob(64, 3))));
        home
    }
}

impl Default for HomeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
