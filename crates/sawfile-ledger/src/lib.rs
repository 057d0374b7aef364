//! The Sawfile ledger: a line-oriented, persisted `filename -> digest` store.
//!
//! # Key Types
//!
//! - [`Ledger`]: backing file plus in-memory map, opened ReadOnly,
//!   WriteOnly or ReadWrite
//! - [`Appender`]: single lazily-started worker that digests queued files
//!   and appends (or rewrites) their ledger lines
//! - [`LedgerConfig`] / [`SyncMode`]: base directory and durability
//!
//! # Design Rules
//!
//! 1. A ReadOnly ledger never writes its backing file.
//! 2. Every write goes through one mutex-guarded writer.
//! 3. A malformed line is skipped; it never aborts a load.
//! 4. Digests are computed outside the append-queue lock.

pub mod appender;
pub mod config;
pub mod error;
pub mod ledger;

pub use appender::{AppendRequest, AppendStats, Appender};
pub use config::{LedgerConfig, SyncMode};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{Ledger, LoadSummary};
