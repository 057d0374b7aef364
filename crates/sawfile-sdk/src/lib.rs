//! High-level API for Sawfile.
//!
//! [`Keys`] is the entry point for applications embedding Sawfile: it opens
//! a ledger in one of three modes, verifies installed files, and registers
//! new files through the background append worker. Operator-facing
//! failures are reported through an injected [`AlertSink`].

pub mod alert;
pub mod config;
pub mod error;
pub mod keys;

pub use alert::{Alert, AlertLevel, AlertSink, LogAlertSink, MemoryAlertSink};
pub use config::KeysConfig;
pub use error::{KeysError, KeysResult};
pub use keys::Keys;

// Re-export key types
pub use sawfile_crypto::DigestConfig;
pub use sawfile_ledger::{AppendStats, LedgerConfig, SyncMode};
pub use sawfile_types::{
    CheckStatus, Digest, EntryCheck, LedgerEntry, OpenMode, Status, VerificationReport,
    VerifyProgress,
};
pub use sawfile_verify::VerifyHandle;
