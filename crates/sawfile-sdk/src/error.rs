use std::path::PathBuf;

use thiserror::Error;

use sawfile_types::Status;

#[derive(Debug, Error)]
pub enum KeysError {
    #[error("cannot read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] sawfile_ledger::LedgerError),

    #[error("digest error: {0}")]
    Crypto(#[from] sawfile_crypto::CryptoError),

    #[error("verification error: {0}")]
    Verify(#[from] sawfile_verify::VerifyError),
}

impl KeysError {
    /// Facade status for an error that prevented the ledger from opening.
    ///
    /// Integrity failures never surface as errors; they leave an open
    /// facade in [`Status::CryptoError`] instead.
    pub fn status(&self) -> Status {
        Status::FileError
    }
}

pub type KeysResult<T> = Result<T, KeysError>;
