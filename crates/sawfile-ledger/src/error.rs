use std::io;
use std::path::PathBuf;

use sawfile_types::TypeError;

/// Errors produced by ledger and appender operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The backing file could not be opened. Fatal to initialisation.
    #[error("cannot open ledger {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error while reading or writing an open ledger.
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),

    /// Write attempted on a ReadOnly ledger.
    #[error("ledger is read-only")]
    ReadOnly,

    /// Content access attempted on a WriteOnly ledger.
    #[error("ledger is write-only; existing content is not loaded")]
    WriteOnly,

    /// A caller path cannot be expressed relative to the base directory.
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// An entry cannot be written in the ledger text format.
    #[error("invalid entry: {0}")]
    InvalidEntry(#[from] TypeError),

    /// The append worker could not be started.
    #[error("cannot start append worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// Requests are queued but no worker is draining them. This is a defect
    /// in the enqueue/exit handshake, never an expected runtime condition.
    #[error("{pending} append request(s) stranded with no worker")]
    QueueStranded { pending: usize },
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
