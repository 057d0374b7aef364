//! Process-wide disk-I/O lock.
//!
//! Hashing reads are serialized through a single mutex shared by every
//! ledger in the process. On a single-disk device parallel reads only add
//! seek contention.

use std::sync::{Mutex, MutexGuard, PoisonError};

static DISK_IO: Mutex<()> = Mutex::new(());

/// Acquire the disk-I/O lock. Held for the duration of one file read.
pub fn disk_io_guard() -> MutexGuard<'static, ()> {
    // The lock guards no data, so a panic in another holder leaves nothing
    // inconsistent.
    DISK_IO.lock().unwrap_or_else(PoisonError::into_inner)
}
