//! Background registration of files into a writable ledger.
//!
//! Producers enqueue [`AppendRequest`]s from any thread. A single worker
//! thread is started on the first enqueue while idle, drains the queue
//! (digesting each file outside the queue lock) and exits when it finds the
//! queue empty. The empty-check that ends a drain and the enqueue that
//! starts one take the same mutex, so a request can never be left behind by
//! an exiting worker.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use sawfile_crypto::DigestEngine;
use sawfile_types::{Digest, LedgerEntry};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;

/// A request to register one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendRequest {
    /// Where to read the file from.
    pub full_path: PathBuf,
    /// Ledger filename to record it under.
    pub relative_name: String,
}

impl AppendRequest {
    pub fn new(full_path: impl Into<PathBuf>, relative_name: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
            relative_name: relative_name.into(),
        }
    }
}

/// Running totals for an appender.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendStats {
    /// New lines written.
    pub appended: u64,
    /// Existing lines whose digest was replaced in place.
    pub rewritten: u64,
    /// Requests dropped because the file could not be digested or written.
    pub failed: u64,
}

struct Queue {
    pending: VecDeque<AppendRequest>,
    /// A worker is running and will look at `pending` again before exiting.
    draining: bool,
    /// Handle of the current or most recently finished worker.
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    queue: Mutex<Queue>,
    idle: Condvar,
    ledger: Arc<Ledger>,
    engine: DigestEngine,
    appended: AtomicU64,
    rewritten: AtomicU64,
    failed: AtomicU64,
}

/// Supervisor of the single append worker for one ledger.
pub struct Appender {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Appender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appender")
            .field("ledger", &self.shared.ledger.path())
            .field("pending", &self.pending())
            .field("draining", &self.is_draining())
            .finish()
    }
}

impl Appender {
    /// Create an appender for `ledger`. No thread is started until the
    /// first request arrives.
    pub fn new(ledger: Arc<Ledger>, engine: DigestEngine) -> LedgerResult<Self> {
        if !ledger.mode().can_write() {
            return Err(LedgerError::ReadOnly);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    pending: VecDeque::new(),
                    draining: false,
                    worker: None,
                }),
                idle: Condvar::new(),
                ledger,
                engine,
                appended: AtomicU64::new(0),
                rewritten: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.shared.ledger
    }

    /// Queue a request, starting the worker if none is running.
    pub fn enqueue(&self, request: AppendRequest) -> LedgerResult<()> {
        let finished = {
            let mut queue = self.shared.lock_queue();
            debug!(filename = %request.relative_name, "append queued");
            queue.pending.push_back(request);
            if queue.draining {
                return Ok(());
            }

            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name("sawfile-append".into())
                .spawn(move || shared.drain());
            match spawned {
                Ok(handle) => {
                    queue.draining = true;
                    queue.worker.replace(handle)
                }
                Err(e) => {
                    queue.pending.pop_back();
                    error!(error = %e, "failed to start append worker");
                    return Err(LedgerError::WorkerSpawn(e));
                }
            }
        };

        // The previous worker already left its drain loop.
        if let Some(handle) = finished {
            join_worker(handle);
        }
        Ok(())
    }

    /// Queue `path` for registration, resolving its ledger filename first.
    pub fn enqueue_path(&self, path: &Path) -> LedgerResult<()> {
        let name = self.shared.ledger.relative_name(path)?;
        let full_path = self.shared.ledger.full_path(&name);
        self.enqueue(AppendRequest::new(full_path, name))
    }

    /// Block until the worker has drained the queue, then join it.
    pub fn wait_idle(&self) -> LedgerResult<()> {
        let handle = {
            let mut queue = self.shared.lock_queue();
            while queue.draining {
                queue = self
                    .shared
                    .idle
                    .wait(queue)
                    .expect("append queue mutex poisoned");
            }
            if !queue.pending.is_empty() {
                let pending = queue.pending.len();
                error!(pending, "append requests stranded with no worker");
                return Err(LedgerError::QueueStranded { pending });
            }
            queue.worker.take()
        };

        if let Some(handle) = handle {
            join_worker(handle);
        }
        Ok(())
    }

    /// Whether a worker is currently draining the queue.
    pub fn is_draining(&self) -> bool {
        self.shared.lock_queue().draining
    }

    /// Requests queued and not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.lock_queue().pending.len()
    }

    pub fn stats(&self) -> AppendStats {
        AppendStats {
            appended: self.shared.appended.load(Ordering::Relaxed),
            rewritten: self.shared.rewritten.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Appender {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            error!(error = %e, "append worker did not drain cleanly");
        }
    }
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().expect("append queue mutex poisoned")
    }

    fn drain(&self) {
        let _reset = DrainReset(self);
        let mut processed = 0usize;
        loop {
            let request = {
                let mut queue = self.lock_queue();
                match queue.pending.pop_front() {
                    Some(request) => request,
                    None => {
                        queue.draining = false;
                        self.idle.notify_all();
                        break;
                    }
                }
            };
            self.process(request);
            processed += 1;
        }
        info!(processed, ledger = %self.ledger.path().display(), "append queue drained");
    }

    fn process(&self, request: AppendRequest) {
        let AppendRequest {
            full_path,
            relative_name,
        } = request;

        let digest = match self.engine.compute_file(&full_path) {
            Ok(digest) if digest.is_null() => {
                warn!(filename = %relative_name, "file unreadable; not registered");
                self.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(digest) => digest,
            Err(e) => {
                error!(filename = %relative_name, error = %e, "cannot digest file; not registered");
                self.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        match self.write(&relative_name, digest) {
            Ok(true) => {
                self.rewritten.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                self.appended.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(filename = %relative_name, error = %e, "ledger write failed");
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record `digest` for `name`. Returns `true` if an existing line was
    /// rewritten rather than a new one appended.
    fn write(&self, name: &str, digest: Digest) -> LedgerResult<bool> {
        if self.ledger.contains(name) && self.ledger.rewrite(name, &digest)? {
            return Ok(true);
        }
        self.ledger.append(&LedgerEntry::new(name, digest))?;
        Ok(false)
    }
}

/// Clears `draining` if the worker unwinds, so waiters are released and
/// see the leftover requests as stranded.
struct DrainReset<'a>(&'a Shared);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut queue = self
                .0
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            queue.draining = false;
            self.0.idle.notify_all();
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("append worker panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use sawfile_types::OpenMode;
    use std::fs;

    fn setup(mode: OpenMode) -> (tempfile::TempDir, Arc<Ledger>) {
        let dir = tempfile::tempdir().unwrap();
        let ledger =
            Ledger::open(&dir.path().join("case.keys"), mode, LedgerConfig::default()).unwrap();
        (dir, Arc::new(ledger))
    }

    #[test]
    fn read_only_ledger_has_no_appender() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.keys");
        fs::write(&path, "").unwrap();
        let ledger =
            Arc::new(Ledger::open(&path, OpenMode::ReadOnly, LedgerConfig::default()).unwrap());
        assert!(matches!(
            Appender::new(ledger, DigestEngine::default()),
            Err(LedgerError::ReadOnly)
        ));
    }

    #[test]
    fn worker_is_started_lazily() {
        let (_dir, ledger) = setup(OpenMode::WriteOnly);
        let appender = Appender::new(ledger, DigestEngine::default()).unwrap();
        assert!(!appender.is_draining());
        appender.wait_idle().unwrap();
        assert_eq!(appender.stats(), AppendStats::default());
    }

    #[test]
    fn appended_files_round_trip_through_reopen() {
        let (dir, ledger) = setup(OpenMode::WriteOnly);
        let appender = Appender::new(Arc::clone(&ledger), DigestEngine::default()).unwrap();

        for i in 0..5 {
            let path = dir.path().join(format!("file{i}.bin"));
            fs::write(&path, format!("content {i}")).unwrap();
            appender.enqueue_path(&path).unwrap();
        }
        appender.wait_idle().unwrap();
        assert!(!appender.is_draining());
        assert_eq!(appender.pending(), 0);
        assert_eq!(appender.stats().appended, 5);

        let reopened =
            Ledger::open(ledger.path(), OpenMode::ReadOnly, LedgerConfig::default()).unwrap();
        assert_eq!(reopened.len(), 5);
        for i in 0..5 {
            let expected = DigestEngine::compute_bytes(format!("content {i}").as_bytes());
            assert_eq!(reopened.get(&format!("file{i}.bin")), Some(expected));
        }
    }

    #[test]
    fn worker_restarts_after_draining() {
        let (dir, ledger) = setup(OpenMode::ReadWrite);
        let appender = Appender::new(ledger, DigestEngine::default()).unwrap();

        for round in 0..3 {
            let path = dir.path().join(format!("round{round}.bin"));
            fs::write(&path, b"x").unwrap();
            appender.enqueue_path(&path).unwrap();
            appender.wait_idle().unwrap();
            assert!(!appender.is_draining());
        }
        assert_eq!(appender.stats().appended, 3);
        assert_eq!(appender.ledger().len(), 3);
    }

    #[test]
    fn concurrent_enqueue_records_every_file_once() {
        let (dir, ledger) = setup(OpenMode::ReadWrite);
        let appender = Arc::new(Appender::new(Arc::clone(&ledger), DigestEngine::default()).unwrap());

        let mut handles = Vec::new();
        for t in 0..4 {
            let appender = Arc::clone(&appender);
            let base = dir.path().to_path_buf();
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    let path = base.join(format!("t{t}-{i}.bin"));
                    fs::write(&path, format!("{t}:{i}")).unwrap();
                    appender.enqueue_path(&path).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        appender.wait_idle().unwrap();
        assert_eq!(appender.stats().appended, 100);

        let text = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(text.lines().count(), 100);

        let reopened =
            Ledger::open(ledger.path(), OpenMode::ReadOnly, LedgerConfig::default()).unwrap();
        assert_eq!(reopened.len(), 100);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let (dir, ledger) = setup(OpenMode::ReadWrite);
        let appender = Appender::new(Arc::clone(&ledger), DigestEngine::default()).unwrap();

        appender
            .enqueue(AppendRequest::new(dir.path().join("critical.bin"), "critical.bin"))
            .unwrap();
        appender
            .enqueue(AppendRequest::new(dir.path().join("session.log"), "session.log"))
            .unwrap();
        appender.wait_idle().unwrap();

        assert_eq!(appender.stats().failed, 2);
        assert!(ledger.is_empty());
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "");
    }

    #[test]
    fn re_adding_a_file_rewrites_its_line() {
        let (dir, ledger) = setup(OpenMode::ReadWrite);
        let appender = Appender::new(Arc::clone(&ledger), DigestEngine::default()).unwrap();
        let path = dir.path().join("app.exe");

        fs::write(&path, b"hello").unwrap();
        appender.enqueue_path(&path).unwrap();
        appender.wait_idle().unwrap();

        fs::write(&path, b"hello!").unwrap();
        appender.enqueue_path(&path).unwrap();
        appender.wait_idle().unwrap();

        let stats = appender.stats();
        assert_eq!((stats.appended, stats.rewritten), (1, 1));

        let text = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert_eq!(
            ledger.get("app.exe"),
            Some(DigestEngine::compute_bytes(b"hello!"))
        );
    }

    #[test]
    fn drop_waits_for_pending_requests() {
        let (dir, ledger) = setup(OpenMode::WriteOnly);
        {
            let appender = Appender::new(Arc::clone(&ledger), DigestEngine::default()).unwrap();
            for i in 0..10 {
                let path = dir.path().join(format!("f{i}"));
                fs::write(&path, [i as u8]).unwrap();
                appender.enqueue_path(&path).unwrap();
            }
        }
        assert_eq!(ledger.len(), 10);
    }
}
