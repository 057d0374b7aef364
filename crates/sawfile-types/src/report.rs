//! Verification result types.
//!
//! Produced per verification call and never persisted.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Outcome of checking one ledger entry against disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    /// Recomputed digest equals the stored digest.
    Match,
    /// Recomputed digest differs from the stored digest.
    Mismatch,
    /// The file could not be read and is not in a soft-fail category.
    Unreadable,
    /// The file could not be read but its type is soft-fail; logged only.
    SoftFailed,
}

impl CheckStatus {
    /// Whether this outcome fails the aggregate verdict.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Mismatch | Self::Unreadable)
    }
}

/// Result of checking a single entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCheck {
    pub filename: String,
    pub expected: Digest,
    /// `None` when the file could not be read.
    pub computed: Option<Digest>,
    pub status: CheckStatus,
}

impl EntryCheck {
    pub fn matched(&self) -> bool {
        self.status == CheckStatus::Match
    }
}

/// Aggregate result of verifying a whole ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub checks: Vec<EntryCheck>,
    /// `true` iff no check is a failure. An empty ledger is all valid.
    pub all_valid: bool,
}

impl VerificationReport {
    /// Build a report, deriving the aggregate verdict from the checks.
    pub fn from_checks(checks: Vec<EntryCheck>) -> Self {
        let all_valid = checks.iter().all(|c| !c.status.is_failure());
        Self { checks, all_valid }
    }

    /// The verdict for an empty ledger.
    pub fn empty() -> Self {
        Self::from_checks(Vec::new())
    }

    /// Checks that failed the verdict.
    pub fn failures(&self) -> impl Iterator<Item = &EntryCheck> {
        self.checks.iter().filter(|c| c.status.is_failure())
    }

    /// Filenames whose content no longer matches the stored digest.
    pub fn mismatched(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Mismatch)
            .map(|c| c.filename.as_str())
            .collect()
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Progress notification emitted after each entry during background
/// verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyProgress {
    /// Entries checked so far (1-based once the first entry is done).
    pub current: usize,
    pub total: usize,
    /// The entry just checked.
    pub filename: String,
}
