//! Digest computation for Sawfile.
//!
//! Files are streamed in fixed-size chunks into a SHA-1 accumulator, so
//! memory use does not depend on file size. All file reads in the process
//! are serialized behind one coarse disk-I/O mutex ([`disk_io_guard`]).
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod config;
pub mod engine;
pub mod error;
pub mod io_lock;

pub use config::DigestConfig;
pub use engine::DigestEngine;
pub use error::{CryptoError, CryptoResult};
pub use io_lock::disk_io_guard;
