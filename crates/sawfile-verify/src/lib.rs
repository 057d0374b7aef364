//! Integrity verification of a loaded Sawfile ledger against disk.
//!
//! Every entry is re-digested and compared with its stored digest. A run
//! never stops at the first failure: it yields a complete
//! [`VerificationReport`](sawfile_types::VerificationReport) and one
//! aggregate verdict. Runs happen either on the calling thread
//! ([`Verifier::verify_blocking`]) or on one background thread
//! ([`Verifier::verify_async`]).

pub mod error;
pub mod verifier;

pub use error::{VerifyError, VerifyResult};
pub use verifier::{VerifyHandle, Verifier};
