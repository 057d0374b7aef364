use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use sawfile_crypto::DigestEngine;
use sawfile_ledger::Ledger;
use sawfile_types::{CheckStatus, EntryCheck, LedgerEntry, VerificationReport, VerifyProgress};

use crate::error::{VerifyError, VerifyResult};

/// Checks ledger entries against the files on disk.
#[derive(Clone, Debug)]
pub struct Verifier {
    ledger: Arc<Ledger>,
    engine: DigestEngine,
}

impl Verifier {
    pub fn new(ledger: Arc<Ledger>, engine: DigestEngine) -> Self {
        Self { ledger, engine }
    }

    /// Verify every entry on the calling thread, in filename order.
    pub fn verify_blocking(&self) -> VerificationReport {
        run(&self.ledger, &self.engine, |_| {})
    }

    /// Verify every entry on a background thread.
    ///
    /// `progress` is called after each entry and `done` exactly once with
    /// the full report, including when the ledger is empty. Reads still go
    /// through the process-wide disk lock, one entry at a time.
    pub fn verify_async<P, D>(&self, progress: P, done: D) -> VerifyResult<VerifyHandle>
    where
        P: FnMut(VerifyProgress) + Send + 'static,
        D: FnOnce(VerificationReport) + Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        let engine = self.engine.clone();
        let handle = thread::Builder::new()
            .name("sawfile-verify".into())
            .spawn(move || done(run(&ledger, &engine, progress)))
            .map_err(VerifyError::WorkerSpawn)?;
        Ok(VerifyHandle { handle })
    }

    /// Check a single entry. `None` if the ledger has no such filename.
    pub fn verify_one(&self, filename: &str) -> Option<EntryCheck> {
        let digest = self.ledger.get(filename)?;
        Some(check_entry(
            &self.ledger,
            &self.engine,
            &LedgerEntry::new(filename, digest),
        ))
    }
}

/// Handle to a background verification.
#[derive(Debug)]
pub struct VerifyHandle {
    handle: JoinHandle<()>,
}

impl VerifyHandle {
    /// Wait for the run (and its `done` callback) to finish.
    pub fn join(self) -> VerifyResult<()> {
        self.handle.join().map_err(|_| VerifyError::WorkerPanicked)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

fn run(
    ledger: &Ledger,
    engine: &DigestEngine,
    mut progress: impl FnMut(VerifyProgress),
) -> VerificationReport {
    let entries = ledger.entries();
    let total = entries.len();
    let mut checks = Vec::with_capacity(total);

    for (i, entry) in entries.iter().enumerate() {
        let check = check_entry(ledger, engine, entry);
        progress(VerifyProgress {
            current: i + 1,
            total,
            filename: check.filename.clone(),
        });
        checks.push(check);
    }

    let report = VerificationReport::from_checks(checks);
    info!(
        ledger = %ledger.path().display(),
        entries = total,
        failures = report.failures().count(),
        all_valid = report.all_valid,
        "ledger verified"
    );
    report
}

fn check_entry(ledger: &Ledger, engine: &DigestEngine, entry: &LedgerEntry) -> EntryCheck {
    let path = ledger.full_path(&entry.filename);
    let (computed, status) = match engine.compute_file(&path) {
        // Only soft-fail files come back null.
        Ok(digest) if digest.is_null() => (None, CheckStatus::SoftFailed),
        Ok(digest) if digest == entry.digest => (Some(digest), CheckStatus::Match),
        Ok(digest) => {
            warn!(
                filename = %entry.filename,
                expected = %entry.digest.short_hex(),
                actual = %digest.short_hex(),
                "digest mismatch"
            );
            (Some(digest), CheckStatus::Mismatch)
        }
        Err(e) => {
            warn!(filename = %entry.filename, error = %e, "file unreadable");
            (None, CheckStatus::Unreadable)
        }
    };
    debug!(filename = %entry.filename, ?status, "entry checked");

    EntryCheck {
        filename: entry.filename.clone(),
        expected: entry.digest,
        computed,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sawfile_ledger::LedgerConfig;
    use sawfile_types::OpenMode;
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn verifier_for(ledger_path: &Path) -> Verifier {
        let ledger =
            Ledger::open(ledger_path, OpenMode::ReadOnly, LedgerConfig::default()).unwrap();
        Verifier::new(Arc::new(ledger), DigestEngine::default())
    }

    fn line(content: &[u8], name: &str) -> String {
        format!("{}  {name}\n", DigestEngine::compute_bytes(content))
    }

    #[test]
    fn hello_scenario_detects_appended_byte() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        let app = dir.path().join("app.exe");
        fs::write(&keys, format!("{HELLO_SHA1}  app.exe\n")).unwrap();
        fs::write(&app, b"hello").unwrap();

        let verifier = verifier_for(&keys);
        let report = verifier.verify_blocking();
        assert!(report.all_valid);
        assert_eq!(report.count(CheckStatus::Match), 1);

        fs::write(&app, b"hello!").unwrap();
        let report = verifier.verify_blocking();
        assert!(!report.all_valid);
        assert_eq!(report.mismatched(), vec!["app.exe"]);
    }

    #[test]
    fn verification_is_idempotent_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        fs::write(dir.path().join("a.bin"), b"a").unwrap();
        fs::write(dir.path().join("b.bin"), b"tampered").unwrap();
        fs::write(dir.path().join("c.bin"), b"c").unwrap();
        fs::write(
            &keys,
            [line(b"c", "c.bin"), line(b"b", "b.bin"), line(b"a", "a.bin")].concat(),
        )
        .unwrap();

        let verifier = verifier_for(&keys);
        let first = verifier.verify_blocking();
        let second = verifier.verify_blocking();
        assert_eq!(first, second);

        // Does not stop at the failing middle entry; sorted by filename.
        let names: Vec<&str> = first.checks.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["a.bin", "b.bin", "c.bin"]);
        assert!(!first.all_valid);
        assert_eq!(first.mismatched(), vec!["b.bin"]);
    }

    #[test]
    fn missing_critical_file_fails_but_soft_fail_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        fs::write(&keys, line(b"x", "session.log")).unwrap();

        let report = verifier_for(&keys).verify_blocking();
        assert!(report.all_valid);
        assert_eq!(report.count(CheckStatus::SoftFailed), 1);

        fs::write(&keys, [line(b"x", "session.log"), line(b"y", "critical.bin")].concat())
            .unwrap();
        let report = verifier_for(&keys).verify_blocking();
        assert!(!report.all_valid);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.filename, "critical.bin");
        assert_eq!(failure.status, CheckStatus::Unreadable);
        assert_eq!(failure.computed, None);
    }

    #[test]
    fn empty_ledger_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        fs::write(&keys, "").unwrap();
        let report = verifier_for(&keys).verify_blocking();
        assert!(report.all_valid);
        assert!(report.is_empty());
    }

    #[test]
    fn async_reports_progress_and_calls_done_once() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        let mut text = String::new();
        for i in 0..4 {
            let content = format!("file {i}");
            fs::write(dir.path().join(format!("f{i}")), &content).unwrap();
            text.push_str(&line(content.as_bytes(), &format!("f{i}")));
        }
        fs::write(&keys, text).unwrap();

        let (progress_tx, progress_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let handle = verifier_for(&keys)
            .verify_async(
                move |p| progress_tx.send(p).unwrap(),
                move |report| done_tx.send(report).unwrap(),
            )
            .unwrap();
        handle.join().unwrap();

        let progress: Vec<VerifyProgress> = progress_rx.iter().collect();
        assert_eq!(progress.len(), 4);
        assert_eq!(progress[0].current, 1);
        assert_eq!(progress[3].current, 4);
        assert!(progress.iter().all(|p| p.total == 4));

        let reports: Vec<VerificationReport> = done_rx.iter().collect();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].all_valid);
    }

    #[test]
    fn async_on_empty_ledger_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        fs::write(&keys, "\n").unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        verifier_for(&keys)
            .verify_async(|_| panic!("no entries"), move |r| done_tx.send(r).unwrap())
            .unwrap()
            .join()
            .unwrap();

        let report = done_rx.recv().unwrap();
        assert!(report.all_valid && report.is_empty());
    }

    #[test]
    fn verify_one_checks_a_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("install.keys");
        fs::write(dir.path().join("app.exe"), b"hello").unwrap();
        fs::write(&keys, format!("{HELLO_SHA1}  app.exe\n")).unwrap();

        let verifier = verifier_for(&keys);
        assert!(verifier.verify_one("app.exe").unwrap().matched());
        assert!(verifier.verify_one("ghost.txt").is_none());
    }
}
