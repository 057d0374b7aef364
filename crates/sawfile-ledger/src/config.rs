use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Flush/sync strategy for ledger writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` after every append or rewrite (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering.
    #[default]
    OsDefault,
}

/// Configuration for a [`Ledger`](crate::Ledger).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory that ledger filenames are relative to. Defaults to the
    /// directory containing the ledger file.
    pub base_dir: Option<PathBuf>,
    /// Sync strategy for writes.
    pub sync_mode: SyncMode,
}
