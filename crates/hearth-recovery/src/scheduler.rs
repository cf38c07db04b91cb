//! The auto-recovery scheduler.
//!
//! The host calls [`AutoRecovery::on_timer`] from its interactive thread.
//! Open documents are cloned there and handed to a single background
//! worker, which writes them one at a time. The worker is spawned lazily on
//! the first job, so a disabled scheduler never starts one.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use anyhow::Context as _;
use hearth_archive::{ArchiveError, ArchiveReader, ArchiveWriter, ContentPolicy, ReaderConfig, WriterConfig};
use hearth_core::{cancel, CancellationToken, ContentDigests, CoreError, Document};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::lock::{is_locked_elsewhere, RecoveryLock};
use crate::record::{
    fresh_path, is_recovery_file, DocumentKey, RecoveredDocument, RecoveryEvent, RecoveryRecord, UNRECOVERABLE_SUFFIX,
};

const EVENT_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────────────────────────

enum Job<D> {
    Snapshot { key: DocumentKey, document: D },
    Remove { key: DocumentKey },
    Delete { path: PathBuf, lock: Option<RecoveryLock> },
}

enum Message<D> {
    Run(Job<D>),
    /// Answered once every earlier job has run.
    Flush(oneshot::Sender<()>),
}

struct Worker<D> {
    jobs: mpsc::UnboundedSender<Message<D>>,
    task: JoinHandle<()>,
}

/// State shared between the host-facing handle and the worker.
struct Shared {
    config: RecoveryConfig,
    writer: ArchiveWriter,
    records: Mutex<HashMap<DocumentKey, RecoveryRecord>>,
    /// Recovered files awaiting adoption, locked by this process.
    pending: Mutex<HashMap<PathBuf, RecoveryLock>>,
    last_snapshot: Mutex<Instant>,
    events: broadcast::Sender<RecoveryEvent>,
}

impl Shared {
    fn emit(&self, event: RecoveryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn run<D: Document>(&self, job: Job<D>, cancel: &CancellationToken) {
        match job {
            Job::Snapshot { key, document } => {
                if let Err(e) = self.snapshot(key, &document, cancel) {
                    if is_interrupted(&e) {
                        debug!(key = %key, "snapshot interrupted");
                    } else {
                        error!(key = %key, error = %format!("{e:#}"), "auto-recovery snapshot failed");
                        self.emit(RecoveryEvent::SnapshotFailed {
                            key,
                            message: format!("{e:#}"),
                        });
                    }
                }
            }
            Job::Remove { key } => {
                let record = lock(&self.records).remove(&key);
                if let Some(record) = record {
                    self.remove(key, record);
                }
            }
            Job::Delete { path, lock } => {
                drop(lock);
                delete_file(&path);
            }
        }
    }

    fn snapshot<D: Document>(&self, key: DocumentKey, document: &D, cancel: &CancellationToken) -> anyhow::Result<()> {
        cancel::checkpoint(cancel)?;

        if !document.is_modified() {
            let record = lock(&self.records).remove(&key);
            if let Some(record) = record {
                self.remove(key, record);
            }
            return Ok(());
        }

        let revision = document.revision();
        let (path, held) = {
            let mut records = lock(&self.records);
            match records.get_mut(&key) {
                Some(record) => {
                    if revision.is_some() && record.revision == revision {
                        debug!(key = %key, "snapshot already up to date");
                        return Ok(());
                    }
                    (record.path.clone(), record.lock.take())
                }
                None => (fresh_path(&self.config.directory, document.name(), &records)?, None),
            }
        };

        // Our own lock would block the rename on some platforms.
        drop(held);
        fs::create_dir_all(&self.config.directory)
            .with_context(|| format!("creating {}", self.config.directory.display()))?;
        let summary = self
            .writer
            .write_to_path(document, &path, cancel)
            .with_context(|| format!("writing {}", path.display()))?;

        let file_lock = RecoveryLock::try_acquire(&path).with_context(|| format!("locking {}", path.display()))?;
        if file_lock.is_none() {
            warn!(path = %path.display(), "recovery file locked by another owner after write");
        }
        lock(&self.records).insert(
            key,
            RecoveryRecord {
                path: path.clone(),
                lock: file_lock,
                revision,
            },
        );
        {
            let mut last = lock(&self.last_snapshot);
            *last = (*last).max(Instant::now());
        }

        debug!(
            key = %key,
            path = %path.display(),
            contents = summary.contents,
            "recovery snapshot written"
        );
        self.emit(RecoveryEvent::SnapshotWritten { key, path });
        Ok(())
    }

    fn remove(&self, key: DocumentKey, record: RecoveryRecord) {
        drop(record.lock);
        delete_file(&record.path);
        self.emit(RecoveryEvent::SnapshotRemoved { key, path: record.path });
    }
}

fn delete_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "recovery file deleted"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete recovery file"),
    }
}

/// Lock a recovery file just read. `None` if another instance took it
/// first or it can no longer be opened.
fn claim(path: &Path) -> Option<RecoveryLock> {
    match RecoveryLock::try_acquire(path) {
        Ok(Some(file_lock)) => Some(file_lock),
        Ok(None) => {
            info!(path = %path.display(), "recovery file claimed by another instance during read");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot lock recovery file");
            None
        }
    }
}

fn is_interrupted(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.downcast_ref::<ArchiveError>().is_some_and(ArchiveError::is_interrupted)
            || cause.downcast_ref::<CoreError>().is_some_and(CoreError::is_interrupted)
    })
}

async fn run_worker<D: Document>(
    shared: Arc<Shared>,
    mut jobs: mpsc::UnboundedReceiver<Message<D>>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = jobs.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        let job = match message {
            Message::Run(job) => job,
            Message::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        let shared = Arc::clone(&shared);
        let token = cancel.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || shared.run(job, &token)).await {
            error!(error = %e, "recovery job panicked");
        }
    }
    debug!("recovery worker stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// AutoRecovery
// ─────────────────────────────────────────────────────────────────────────────

/// Periodic crash-recovery snapshots for open documents of type `D`.
pub struct AutoRecovery<D: Document> {
    shared: Arc<Shared>,
    digests: Arc<ContentDigests>,
    handle: Handle,
    worker: Mutex<Option<Worker<D>>>,
    cancel: CancellationToken,
}

impl<D: Document> AutoRecovery<D> {
    /// Create a scheduler whose worker runs on `handle`.
    pub fn new(config: RecoveryConfig, digests: Arc<ContentDigests>, handle: Handle) -> Self {
        let writer = ArchiveWriter::new(
            Arc::clone(&digests),
            WriterConfig::default()
                .with_compression_level(config.compression_level)
                .with_content_policy(ContentPolicy::TemporaryOnly),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                writer,
                records: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                last_snapshot: Mutex::new(Instant::now()),
                events,
            }),
            digests,
            handle,
            worker: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.shared.config
    }

    /// How often the host should call [`on_timer`](Self::on_timer).
    /// `None` when auto-recovery is disabled.
    pub fn timer_interval(&self) -> Option<Duration> {
        self.shared.config.is_enabled().then_some(self.shared.config.interval)
    }

    /// Whether the background worker has been started.
    pub fn is_worker_running(&self) -> bool {
        lock(&self.worker).as_ref().is_some_and(|worker| !worker.task.is_finished())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecoveryEvent> {
        self.shared.events.subscribe()
    }

    /// Timer tick. Clones every document and schedules a snapshot of each,
    /// unless the cooldown since the last round has not elapsed.
    ///
    /// Returns the number of snapshots scheduled.
    pub fn on_timer(&self, now: Instant, documents: &[(DocumentKey, &D)]) -> usize {
        if !self.shared.config.is_enabled() || self.cancel.is_cancelled() {
            return 0;
        }
        {
            let mut last = lock(&self.shared.last_snapshot);
            if now.saturating_duration_since(*last) < self.shared.config.min_cooldown {
                debug!("auto-recovery tick within cooldown");
                return 0;
            }
            *last = now;
        }

        let mut scheduled = 0;
        for (key, document) in documents {
            let job = Job::Snapshot {
                key: *key,
                document: (*document).clone(),
            };
            if self.enqueue(job) {
                scheduled += 1;
            }
        }
        scheduled
    }

    /// Unlock and delete the recovery file of a closed document.
    pub fn document_closed(&self, key: DocumentKey) {
        let recorded = lock(&self.shared.records).contains_key(&key);
        if !recorded && lock(&self.worker).is_none() {
            return;
        }
        self.enqueue(Job::Remove { key });
    }

    /// Wait until every job queued so far has run.
    pub async fn flush(&self) -> Result<()> {
        let jobs = match lock(&self.worker).as_ref() {
            Some(worker) => worker.jobs.clone(),
            None => return Ok(()),
        };
        let (done, wait) = oneshot::channel();
        jobs.send(Message::Flush(done)).map_err(|_| RecoveryError::WorkerStopped)?;
        wait.await.map_err(|_| RecoveryError::WorkerStopped)
    }

    /// Stop the worker. An in-flight snapshot is interrupted and its
    /// temporary file discarded.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(worker) = lock(&self.worker).take() {
            worker.task.abort();
        }
    }

    fn enqueue(&self, job: Job<D>) -> bool {
        let mut worker = lock(&self.worker);
        if self.cancel.is_cancelled() {
            return false;
        }
        let worker = worker.get_or_insert_with(|| {
            let (jobs, receiver) = mpsc::unbounded_channel();
            let task = self
                .handle
                .spawn(run_worker(Arc::clone(&self.shared), receiver, self.cancel.clone()));
            debug!("recovery worker started");
            Worker { jobs, task }
        });
        worker.jobs.send(Message::Run(job)).is_ok()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Startup adoption
    // ─────────────────────────────────────────────────────────────────────────

    /// Scan the recovery directory for abandoned files, newest first.
    ///
    /// Files locked by another running instance are skipped. Readable files
    /// are locked by this process and returned pending adoption; unreadable
    /// ones are renamed aside so they are not retried.
    pub fn recover(&self) -> Result<Vec<RecoveredDocument<D>>> {
        let directory = &self.shared.config.directory;
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !is_recovery_file(&path) || !entry.file_type()?.is_file() {
                continue;
            }
            let modified = match entry.metadata() {
                Ok(metadata) => metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "recovery file vanished during scan");
                    continue;
                }
            };
            candidates.push((modified, path));
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let owned: HashSet<PathBuf> = lock(&self.shared.records)
            .values()
            .map(|record| record.path.clone())
            .chain(lock(&self.shared.pending).keys().cloned())
            .collect();

        let reader = ArchiveReader::new(Arc::clone(&self.digests), ReaderConfig::default().with_copy_source(true));
        let mut recovered = Vec::new();
        let mut claimed = Vec::new();

        for (_, path) in candidates {
            if owned.contains(&path) {
                continue;
            }
            match is_locked_elsewhere(&path) {
                Ok(false) => {}
                Ok(true) => {
                    info!(path = %path.display(), "recovery file owned by a running instance, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot probe recovery file lock");
                    continue;
                }
            }

            let outcome = match reader.read::<D>(&path, &self.cancel) {
                Ok(outcome) => outcome,
                Err(e) if e.is_interrupted() => return Err(e.into()),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "recovery file unreadable");
                    self.set_aside(&path);
                    continue;
                }
            };

            let Some(file_lock) = claim(&path) else {
                continue;
            };
            claimed.push(file_lock);

            let invalid_contents = outcome.invalid_contents().to_vec();
            info!(
                path = %path.display(),
                damaged = !invalid_contents.is_empty(),
                "recovered document"
            );
            recovered.push(RecoveredDocument {
                document: outcome.into_document(),
                path,
                invalid_contents,
            });
        }

        lock(&self.shared.pending).extend(
            claimed
                .into_iter()
                .map(|file_lock| (file_lock.path().to_path_buf(), file_lock)),
        );
        if !recovered.is_empty() {
            self.shared.emit(RecoveryEvent::RecoveredReady {
                count: recovered.len(),
            });
        }
        Ok(recovered)
    }

    /// Make a recovered document's file the recovery record of `key`, so
    /// later snapshots overwrite it.
    pub fn adopt(&self, key: DocumentKey, recovered: &RecoveredDocument<D>) {
        let file_lock = lock(&self.shared.pending).remove(&recovered.path);
        let previous = lock(&self.shared.records).insert(
            key,
            RecoveryRecord {
                path: recovered.path.clone(),
                lock: file_lock,
                revision: None,
            },
        );
        if let Some(previous) = previous.filter(|previous| previous.path != recovered.path) {
            self.enqueue(Job::Delete {
                path: previous.path,
                lock: previous.lock,
            });
        }
        debug!(key = %key, path = %recovered.path.display(), "recovered document adopted");
    }

    /// Drop a recovered document the user declined, deleting its file.
    pub fn discard(&self, recovered: &RecoveredDocument<D>) {
        let file_lock = lock(&self.shared.pending).remove(&recovered.path);
        self.enqueue(Job::Delete {
            path: recovered.path.clone(),
            lock: file_lock,
        });
    }

    fn set_aside(&self, path: &Path) {
        let target = path.with_extension(UNRECOVERABLE_SUFFIX);
        match fs::rename(path, &target) {
            Ok(()) => {
                warn!(path = %target.display(), "recovery file set aside as unrecoverable");
                self.shared.emit(RecoveryEvent::Unrecoverable { path: target });
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to set recovery file aside"),
        }
    }
}

impl<D: Document> Drop for AutoRecovery<D> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_testkit::{init_tracing, HomeFixture, SampleHome};

    fn scheduler(fixture: &HomeFixture, interval: Duration) -> AutoRecovery<SampleHome> {
        let config = RecoveryConfig::new(fixture.path("recovery")).with_interval(interval);
        AutoRecovery::new(config, Arc::clone(&fixture.digests), Handle::current())
    }

    fn recovery_files(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries.map(|entry| entry.unwrap().path()).collect();
        files.sort();
        files
    }

    fn drain(events: &mut broadcast::Receiver<RecoveryEvent>) -> Vec<RecoveryEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_zero_interval_never_schedules() {
        let fixture = HomeFixture::new();
        let recovery = scheduler(&fixture, Duration::ZERO);
        let mut home = fixture.sample_home();
        home.touch();

        let start = Instant::now();
        for hours in [0, 1, 24, 24 * 365] {
            let now = start + Duration::from_secs(hours * 3600);
            assert_eq!(recovery.on_timer(now, &[(DocumentKey(1), &home)]), 0);
        }
        assert_eq!(recovery.timer_interval(), None);
        assert!(!recovery.is_worker_running());
        assert!(recovery_files(&fixture.path("recovery")).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cooldown_gates_first_tick() {
        init_tracing();
        let fixture = HomeFixture::new();
        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(10));
        let mut home = fixture.sample_home();
        home.touch();
        let documents = [(DocumentKey(1), &home)];

        assert_eq!(recovery.on_timer(start + Duration::from_secs(10), &documents), 0);
        assert!(!recovery.is_worker_running());

        assert_eq!(recovery.on_timer(start + Duration::from_secs(31), &documents), 1);
        recovery.flush().await.unwrap();
        assert_eq!(
            recovery_files(&fixture.path("recovery")),
            vec![fixture.path("recovery").join("Sample.recovered")]
        );

        // Cooldown restarts from the last round.
        assert_eq!(recovery.on_timer(start + Duration::from_secs(45), &documents), 0);
        assert_eq!(recovery.on_timer(start + Duration::from_secs(62), &documents), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unchanged_revision_is_not_rewritten() {
        let fixture = HomeFixture::new();
        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut events = recovery.subscribe();
        let mut home = fixture.sample_home();
        home.touch();

        recovery.on_timer(start + Duration::from_secs(60), &[(DocumentKey(7), &home)]);
        recovery.flush().await.unwrap();
        let path = fixture.path("recovery").join("Sample.recovered");
        let written = fs::metadata(&path).unwrap().modified().unwrap();

        recovery.on_timer(start + Duration::from_secs(120), &[(DocumentKey(7), &home)]);
        recovery.flush().await.unwrap();

        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), written);
        assert_eq!(recovery_files(&fixture.path("recovery")), vec![path.clone()]);
        assert_eq!(
            drain(&mut events),
            vec![RecoveryEvent::SnapshotWritten {
                key: DocumentKey(7),
                path
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_new_revision_overwrites_same_file() {
        let fixture = HomeFixture::new();
        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut home = fixture.sample_home();
        home.touch();

        recovery.on_timer(start + Duration::from_secs(60), &[(DocumentKey(1), &home)]);
        recovery.flush().await.unwrap();
        home.add_wall(0.0, 400.0, 0.0, 0.0);
        home.touch();
        recovery.on_timer(start + Duration::from_secs(120), &[(DocumentKey(1), &home)]);
        recovery.flush().await.unwrap();

        let files = recovery_files(&fixture.path("recovery"));
        assert_eq!(files.len(), 1);
        assert!(is_locked_elsewhere(&files[0]).unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_saved_document_loses_its_snapshot() {
        let fixture = HomeFixture::new();
        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut home = fixture.sample_home();
        home.touch();

        recovery.on_timer(start + Duration::from_secs(60), &[(DocumentKey(1), &home)]);
        recovery.flush().await.unwrap();
        assert_eq!(recovery_files(&fixture.path("recovery")).len(), 1);

        home.mark_saved();
        recovery.on_timer(start + Duration::from_secs(120), &[(DocumentKey(1), &home)]);
        recovery.flush().await.unwrap();
        assert!(recovery_files(&fixture.path("recovery")).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_closed_document_file_is_deleted() {
        let fixture = HomeFixture::new();
        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut events = recovery.subscribe();
        let mut home = fixture.sample_home();
        home.touch();

        recovery.on_timer(start + Duration::from_secs(60), &[(DocumentKey(3), &home)]);
        recovery.document_closed(DocumentKey(3));
        recovery.flush().await.unwrap();

        assert!(recovery_files(&fixture.path("recovery")).is_empty());
        let seen = drain(&mut events);
        assert!(matches!(seen.last(), Some(RecoveryEvent::SnapshotRemoved { key: DocumentKey(3), .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_same_name_documents_get_distinct_files() {
        let fixture = HomeFixture::new();
        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut a = fixture.sample_home();
        let mut b = fixture.sample_home();
        a.touch();
        b.touch();

        recovery.on_timer(start + Duration::from_secs(60), &[(DocumentKey(1), &a), (DocumentKey(2), &b)]);
        recovery.flush().await.unwrap();
        assert_eq!(recovery_files(&fixture.path("recovery")).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recover_skips_locked_and_sets_aside_garbage() {
        let fixture = HomeFixture::new();
        let dir = fixture.path("recovery");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("garbage.recovered"), b"not a zip").unwrap();
        fs::write(dir.join("owned.recovered"), b"held by someone").unwrap();
        let held = RecoveryLock::try_acquire(&dir.join("owned.recovered")).unwrap().unwrap();

        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut events = recovery.subscribe();
        let recovered = recovery.recover().unwrap();

        assert!(recovered.is_empty());
        assert!(dir.join("owned.recovered").exists());
        assert!(dir.join("garbage.unrecoverable").exists());
        assert!(!dir.join("garbage.recovered").exists());
        assert_eq!(
            drain(&mut events),
            vec![RecoveryEvent::Unrecoverable {
                path: dir.join("garbage.unrecoverable")
            }]
        );
        drop(held);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recover_missing_directory() {
        let fixture = HomeFixture::new();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        assert!(recovery.recover().unwrap().is_empty());
    }

    #[test]
    fn test_claim_skips_file_that_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.recovered");
        assert!(claim(&path).is_none());

        fs::write(&path, b"snapshot").unwrap();
        let held = claim(&path).unwrap();
        assert!(claim(&path).is_none());
        drop(held);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interrupted_recover_leaves_files_unlocked() {
        let fixture = HomeFixture::new();
        let dir = fixture.path("recovery");
        fs::create_dir_all(&dir).unwrap();
        let writer = ArchiveWriter::new(Arc::clone(&fixture.digests), WriterConfig::default());
        let home = fixture.sample_home();
        for name in ["first.recovered", "second.recovered"] {
            writer.write_to_path(&home, &dir.join(name), &CancellationToken::new()).unwrap();
        }

        let recovery = scheduler(&fixture, Duration::from_secs(60));
        recovery.shutdown();
        let err = recovery.recover().unwrap_err();

        assert!(err.is_interrupted());
        for name in ["first.recovered", "second.recovered"] {
            assert!(dir.join(name).exists());
            assert!(!is_locked_elsewhere(&dir.join(name)).unwrap());
        }
        assert!(lock(&recovery.shared.pending).is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_closing_untracked_document_starts_no_worker() {
        let fixture = HomeFixture::new();
        let disabled = scheduler(&fixture, Duration::ZERO);
        disabled.document_closed(DocumentKey(1));
        assert!(!disabled.is_worker_running());
        disabled.flush().await.unwrap();

        let enabled = scheduler(&fixture, Duration::from_secs(60));
        enabled.document_closed(DocumentKey(2));
        assert!(!enabled.is_worker_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_adopted_file_is_reused_and_discard_deletes() {
        let fixture = HomeFixture::new();
        let dir = fixture.path("recovery");
        fs::create_dir_all(&dir).unwrap();
        let writer = ArchiveWriter::new(Arc::clone(&fixture.digests), WriterConfig::default());
        let cancel = CancellationToken::new();
        let home = fixture.sample_home();
        writer.write_to_path(&home, &dir.join("first.recovered"), &cancel).unwrap();
        writer.write_to_path(&home, &dir.join("second.recovered"), &cancel).unwrap();

        let start = Instant::now();
        let recovery = scheduler(&fixture, Duration::from_secs(60));
        let mut recovered = recovery.recover().unwrap();
        assert_eq!(recovered.len(), 2);
        for document in &recovered {
            assert!(is_locked_elsewhere(&document.path).unwrap());
            assert!(!document.is_damaged());
        }

        let declined = recovered.pop().unwrap();
        let mut kept = recovered.pop().unwrap();
        recovery.discard(&declined);
        recovery.adopt(DocumentKey(9), &kept);

        kept.document.touch();
        recovery.on_timer(start + Duration::from_secs(60), &[(DocumentKey(9), &kept.document)]);
        recovery.flush().await.unwrap();

        assert!(!declined.path.exists());
        assert_eq!(recovery_files(&dir), vec![kept.path.clone()]);
    }
}
