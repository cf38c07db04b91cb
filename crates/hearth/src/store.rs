//! The home store: foreground open and save.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use hearth_archive::{
    ArchiveReader, ArchiveWriter, ContentPolicy, ReadOutcome, TrustedContentSource, WriteSummary,
};
use hearth_core::{cancel, CancellationToken, ContentDigests, Document};
use hearth_recovery::AutoRecovery;
use tempfile::NamedTempFile;
use tokio::runtime::Handle;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{HearthError, Result};
use crate::space::{available_space, ensure_space};

/// Opens and saves homes. Owns the process-wide digest service.
///
/// Reads and saves run on the calling thread.
pub struct HomeStore {
    config: StoreConfig,
    digests: Arc<ContentDigests>,
    trusted: Option<Arc<dyn TrustedContentSource>>,
}

impl HomeStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            digests: Arc::new(ContentDigests::new()),
            trusted: None,
        }
    }

    /// Catalog content used to replace damaged or, when configured,
    /// all archive content on read.
    pub fn with_trusted_source(mut self, trusted: Arc<dyn TrustedContentSource>) -> Self {
        self.trusted = Some(trusted);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn digests(&self) -> &Arc<ContentDigests> {
        &self.digests
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reading
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a home, repairing it if needed.
    pub fn open<D: Document>(&self, path: &Path, cancel: &CancellationToken) -> Result<ReadOutcome<D>> {
        let mut reader = ArchiveReader::new(Arc::clone(&self.digests), self.config.reader.clone());
        if let Some(trusted) = &self.trusted {
            reader = reader.with_trusted_source(Arc::clone(trusted));
        }
        let outcome = reader.read(path, cancel)?;
        info!(path = %path.display(), outcome = %outcome.phase(), "home opened");
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writing
    // ─────────────────────────────────────────────────────────────────────────

    /// Save with the configured content policy.
    pub fn save<D: Document>(&self, document: &D, path: &Path, cancel: &CancellationToken) -> Result<WriteSummary> {
        self.save_with_policy(document, path, self.config.writer.content_policy, cancel)
    }

    /// Save a structure-only copy with no content entries.
    pub fn export_structure<D: Document>(
        &self,
        document: &D,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<WriteSummary> {
        self.save_with_policy(document, path, ContentPolicy::None, cancel)
    }

    /// Save `document` to `path`.
    ///
    /// The archive is staged in the temporary directory first. `path` is
    /// only replaced once the staged archive is complete and the
    /// destination volume has room for it; a failed save leaves any
    /// previous file untouched.
    pub fn save_with_policy<D: Document>(
        &self,
        document: &D,
        path: &Path,
        policy: ContentPolicy,
        cancel: &CancellationToken,
    ) -> Result<WriteSummary> {
        let writer = ArchiveWriter::new(
            Arc::clone(&self.digests),
            self.config.writer.clone().with_content_policy(policy),
        );

        let mut staged = self.staging_file()?;
        let summary = writer.write(document, staged.as_file_mut(), cancel)?;
        let required = staged.as_file().metadata()?.len();

        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        ensure_space(path, required, available_space(parent))?;

        let mut target = tempfile::Builder::new()
            .prefix(".hearth-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        let mut source = File::open(staged.path())?;
        cancel::copy(&mut source, target.as_file_mut(), cancel)?;
        target.as_file().sync_all()?;
        target.persist(path).map_err(|e| HearthError::Io(e.error))?;

        info!(
            path = %path.display(),
            bytes = required,
            contents = summary.contents,
            "home saved"
        );
        Ok(summary)
    }

    fn staging_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("hearth-save-").suffix(".tmp");
        let file = match &self.config.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recovery
    // ─────────────────────────────────────────────────────────────────────────

    /// A crash-recovery scheduler sharing this store's digest service.
    pub fn auto_recovery<D: Document>(&self, handle: Handle) -> AutoRecovery<D> {
        AutoRecovery::new(self.config.recovery.clone(), Arc::clone(&self.digests), handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::Content;
    use hearth_testkit::{HomeFixture, SampleHome};

    fn store(fixture: &HomeFixture) -> HomeStore {
        HomeStore::new(StoreConfig::default().with_temp_dir(fixture.dir()))
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn test_save_and_open() {
        let fixture = HomeFixture::new();
        let store = store(&fixture);
        let home = fixture.sample_home();
        let path = fixture.path("saved/home.sh3d");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let summary = store.save(&home, &path, &CancellationToken::new()).unwrap();
        assert_eq!(summary.contents, 4);

        let outcome = store.open::<SampleHome>(&path, &CancellationToken::new()).unwrap();
        assert!(matches!(outcome, ReadOutcome::Clean(_)));
        assert_eq!(outcome.document().structure(), home.structure());
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let fixture = HomeFixture::new();
        let store = store(&fixture);
        let out = fixture.path("out");
        std::fs::create_dir_all(&out).unwrap();
        let path = out.join("home.sh3d");

        store.save(&fixture.sample_home(), &path, &CancellationToken::new()).unwrap();
        store.save(&fixture.sample_home(), &path, &CancellationToken::new()).unwrap();

        let names: Vec<_> = std::fs::read_dir(&out).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, vec![std::ffi::OsString::from("home.sh3d")]);
    }

    #[test]
    fn test_interrupted_save_keeps_previous_file() {
        let fixture = HomeFixture::new();
        let store = store(&fixture);
        let path = fixture.write_file("home.sh3d", b"previous version");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = store.save(&fixture.sample_home(), &path, &cancel).unwrap_err();

        assert!(err.is_interrupted());
        assert_eq!(std::fs::read(&path).unwrap(), b"previous version");
    }

    #[test]
    fn test_export_structure_has_no_content_entries() {
        let fixture = HomeFixture::new();
        let store = store(&fixture);
        let path = fixture.path("structure.sh3d");

        let summary = store
            .export_structure(&fixture.sample_home(), &path, &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.contents, 0);
        assert_eq!(entry_names(&path), vec!["Home".to_string()]);
    }

    #[test]
    fn test_saving_over_the_opened_file() {
        let fixture = HomeFixture::new();
        let store = store(&fixture);
        let path = fixture.path("home.sh3d");

        let mut home = SampleHome::named("renumbered");
        for seed in 0..3u8 {
            home.add_piece(
                &format!("piece {seed}"),
                Content::from_bytes("icon.png", HomeFixture::blob(40, seed)),
                Content::from_bytes("model.obj", HomeFixture::blob(80, seed + 100)),
            );
        }
        store.save(&home, &path, &CancellationToken::new()).unwrap();

        let mut opened = store
            .open::<SampleHome>(&path, &CancellationToken::new())
            .unwrap()
            .into_document();
        opened.furniture.remove(0);
        opened.touch();
        store.save(&opened, &path, &CancellationToken::new()).unwrap();

        assert_eq!(opened.furniture[1].icon.read_all().unwrap(), HomeFixture::blob(40, 2));
        assert_eq!(opened.furniture[1].model.read_all().unwrap(), HomeFixture::blob(80, 102));
        store.save(&opened, &path, &CancellationToken::new()).unwrap();

        let reopened = store.open::<SampleHome>(&path, &CancellationToken::new()).unwrap();
        assert!(matches!(reopened, ReadOutcome::Clean(_)));
        assert_eq!(reopened.document().structure(), opened.structure());
        assert_eq!(reopened.document().furniture[0].icon.read_all().unwrap(), HomeFixture::blob(40, 1));
    }
}
