use std::io;
use std::path::PathBuf;

/// Errors from digest computation.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// A protected file could not be opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
