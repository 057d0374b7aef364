//! Foundation types for Sawfile.
//!
//! Sawfile protects installed and case-generated files against tampering by
//! keeping a ledger of `filename -> digest` pairs and checking files on disk
//! against it. Every other Sawfile crate depends on `sawfile-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: 20-byte SHA-1 fingerprint, rendered as 40 lowercase hex chars
//! - [`LedgerEntry`]: one `filename -> digest` pair and its text-line form
//! - [`OpenMode`]: ReadOnly / WriteOnly / ReadWrite ledger access
//! - [`Status`]: facade status after open/verify
//! - [`VerificationReport`]: per-entry checks plus the aggregate verdict

pub mod digest;
pub mod entry;
pub mod error;
pub mod mode;
pub mod report;

pub use digest::{Digest, DIGEST_HEX_LEN, DIGEST_LEN};
pub use entry::LedgerEntry;
pub use error::TypeError;
pub use mode::{OpenMode, Status};
pub use report::{CheckStatus, EntryCheck, VerificationReport, VerifyProgress};
