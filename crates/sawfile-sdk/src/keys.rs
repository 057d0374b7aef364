use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use sawfile_crypto::DigestEngine;
use sawfile_ledger::{AppendStats, Appender, Ledger, LedgerError};
use sawfile_types::{
    EntryCheck, LedgerEntry, OpenMode, Status, VerificationReport, VerifyProgress,
};
use sawfile_verify::{Verifier, VerifyHandle};

use crate::alert::{AlertLevel, AlertSink, LogAlertSink};
use crate::config::KeysConfig;
use crate::error::{KeysError, KeysResult};

/// High-level Sawfile API.
///
/// One `Keys` owns one ledger. It is `Send + Sync`; share it with an `Arc`
/// to register files from several threads.
pub struct Keys {
    config: KeysConfig,
    ledger: Arc<Ledger>,
    engine: DigestEngine,
    verifier: Verifier,
    /// `None` for ReadOnly ledgers. Dropping it waits for the worker.
    appender: Option<Appender>,
    alerts: Arc<dyn AlertSink>,
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    status: Status,
    last_report: Option<VerificationReport>,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("ledger", &self.ledger)
            .field("status", &self.status())
            .finish()
    }
}

impl Keys {
    /// Open with alerts forwarded to `tracing`.
    pub fn open(config: KeysConfig) -> KeysResult<Self> {
        Self::open_with_alerts(config, Arc::new(LogAlertSink))
    }

    /// Open the configured ledger.
    ///
    /// ReadOnly ledgers are verified immediately, along with any
    /// `required` filenames; a failure leaves the facade in
    /// [`Status::CryptoError`] rather than returning an error. A ReadOnly
    /// ledger with no usable entries leaves it in [`Status::FileError`]
    /// without verifying. Writable ledgers may start empty.
    pub fn open_with_alerts(config: KeysConfig, alerts: Arc<dyn AlertSink>) -> KeysResult<Self> {
        let ledger = Ledger::open(&config.ledger_path, config.mode, config.ledger.clone())
            .inspect_err(|e| error!(error = %e, "cannot open ledger"))?;
        let ledger = Arc::new(ledger);
        let engine = DigestEngine::new(config.digest.clone());

        let appender = if config.mode.can_write() {
            Some(Appender::new(Arc::clone(&ledger), engine.clone())?)
        } else {
            None
        };

        let keys = Self {
            verifier: Verifier::new(Arc::clone(&ledger), engine.clone()),
            config,
            ledger,
            engine,
            appender,
            alerts,
            state: Arc::new(Mutex::new(State::default())),
        };

        if keys.config.mode == OpenMode::ReadOnly {
            if !keys.ledger.has_entries() {
                keys.report_empty_ledger();
            } else {
                keys.verify_blocking();
                if !keys.config.required.is_empty()
                    && !keys.contains_required(&keys.config.required)
                {
                    keys.set_status(Status::CryptoError);
                }
            }
        }

        info!(
            path = %keys.ledger.path().display(),
            mode = %keys.config.mode,
            status = %keys.status(),
            "keys opened"
        );
        Ok(keys)
    }

    pub fn status(&self) -> Status {
        self.state.lock().expect("keys state mutex poisoned").status
    }

    /// Report from the most recent full verification, if any has run.
    pub fn last_report(&self) -> Option<VerificationReport> {
        self.state
            .lock()
            .expect("keys state mutex poisoned")
            .last_report
            .clone()
    }

    pub fn config(&self) -> &KeysConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Re-parse the ledger file. Returns whether it holds any entries.
    ///
    /// A ReadOnly ledger that reloads empty moves the facade to
    /// [`Status::FileError`].
    pub fn load_entries(&self) -> bool {
        match self.ledger.reload() {
            Ok(summary) if summary.entries == 0 && self.config.mode == OpenMode::ReadOnly => {
                self.report_empty_ledger();
                false
            }
            Ok(summary) => summary.entries > 0,
            Err(LedgerError::WriteOnly) => self.ledger.has_entries(),
            Err(e) => {
                error!(error = %e, "cannot reload ledger");
                self.set_status(Status::FileError);
                false
            }
        }
    }

    /// Verify every entry on the calling thread. Returns the aggregate
    /// verdict.
    pub fn verify_blocking(&self) -> bool {
        self.verify_report().all_valid
    }

    /// Verify every entry on the calling thread, returning the full report.
    pub fn verify_report(&self) -> VerificationReport {
        let report = self.verifier.verify_blocking();
        record_verdict(&self.state, self.alerts.as_ref(), &report);
        report
    }

    /// Verify every entry on a background thread.
    ///
    /// Status and alerts are updated before `done` runs.
    pub fn verify_async<P, D>(&self, progress: P, done: D) -> KeysResult<VerifyHandle>
    where
        P: FnMut(VerifyProgress) + Send + 'static,
        D: FnOnce(VerificationReport) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let alerts = Arc::clone(&self.alerts);
        let handle = self.verifier.verify_async(progress, move |report| {
            record_verdict(&state, alerts.as_ref(), &report);
            done(report);
        })?;
        Ok(handle)
    }

    /// Check one file against its ledger entry. `None` if it has no entry.
    pub fn verify_file(&self, path: &Path) -> KeysResult<Option<EntryCheck>> {
        let name = self.ledger.relative_name(path)?;
        let check = self.verifier.verify_one(&name);
        if let Some(check) = check.as_ref().filter(|c| c.status.is_failure()) {
            self.raise_integrity_alert(&check.filename);
            self.set_status(Status::CryptoError);
        }
        Ok(check)
    }

    /// Queue `path` for registration by the append worker.
    ///
    /// Relative paths are taken relative to the ledger's base directory.
    /// Digest failures are logged by the worker, not returned here.
    pub fn add_file(&self, path: &Path) -> KeysResult<()> {
        self.appender()?.enqueue_path(path)?;
        Ok(())
    }

    /// Replace the digest of an existing entry with the file's current
    /// digest. Returns `false`, changing nothing, when `path` has no entry.
    pub fn update_existing_key(&self, path: &Path) -> KeysResult<bool> {
        let appender = self.appender()?;
        appender.wait_idle()?;

        let name = self.ledger.relative_name(path)?;
        if !self.ledger.has_entry(&name)? {
            info!(filename = %name, "no ledger entry to update");
            return Ok(false);
        }

        let digest = self.engine.compute_file(&self.ledger.full_path(&name))?;
        if digest.is_null() {
            warn!(filename = %name, "file unreadable; entry not updated");
            return Ok(false);
        }

        let updated = self.ledger.rewrite(&name, &digest)?;
        if updated {
            info!(filename = %name, digest = %digest.short_hex(), "ledger entry updated");
        } else {
            warn!(filename = %name, "ledger entry vanished before update");
        }
        Ok(updated)
    }

    /// Whether every name in `names` has an entry. Missing names are
    /// logged and reported in a single alert.
    pub fn contains_required<S: AsRef<str>>(&self, names: &[S]) -> bool {
        let missing = self.missing_required(names);
        if missing.is_empty() {
            return true;
        }
        for name in &missing {
            warn!(filename = %name, "required file missing from ledger");
        }
        self.alerts.alert(
            AlertLevel::Critical,
            &format!("required files missing from ledger: {}", missing.join(", ")),
        );
        false
    }

    /// Names from `names` with no ledger entry, in the order given.
    pub fn missing_required<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !self.ledger.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Snapshot of the loaded entries, sorted by filename.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.ledger.entries()
    }

    /// Block until every queued file has been processed.
    pub fn wait_idle(&self) -> KeysResult<()> {
        if let Some(appender) = &self.appender {
            appender.wait_idle()?;
        }
        Ok(())
    }

    /// Append worker counters. `None` for ReadOnly ledgers.
    pub fn append_stats(&self) -> Option<AppendStats> {
        self.appender.as_ref().map(Appender::stats)
    }

    fn appender(&self) -> KeysResult<&Appender> {
        self.appender
            .as_ref()
            .ok_or(KeysError::Ledger(LedgerError::ReadOnly))
    }

    fn set_status(&self, status: Status) {
        self.state.lock().expect("keys state mutex poisoned").status = status;
    }

    fn raise_integrity_alert(&self, filename: &str) {
        raise_integrity_alert(self.alerts.as_ref(), filename);
    }

    /// Nothing to verify against counts as a broken install.
    fn report_empty_ledger(&self) {
        let path = self.ledger.path().display();
        error!(path = %path, "ledger has no entries");
        self.alerts
            .alert(AlertLevel::Critical, &format!("ledger {path} has no entries"));
        self.set_status(Status::FileError);
    }
}

/// Apply a verification verdict: alert per failure and move the status
/// between Ok and CryptoError. FileError is never cleared.
fn record_verdict(state: &Mutex<State>, alerts: &dyn AlertSink, report: &VerificationReport) {
    for failure in report.failures() {
        raise_integrity_alert(alerts, &failure.filename);
    }

    let mut state = state.lock().expect("keys state mutex poisoned");
    state.status = match (state.status, report.all_valid) {
        (Status::FileError, _) => Status::FileError,
        (_, true) => Status::Ok,
        (_, false) => Status::CryptoError,
    };
    state.last_report = Some(report.clone());
}

fn raise_integrity_alert(alerts: &dyn AlertSink, filename: &str) {
    alerts.alert(
        AlertLevel::Critical,
        &format!("integrity check failed for {filename}"),
    );
}
