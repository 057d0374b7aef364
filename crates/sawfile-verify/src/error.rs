use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("cannot start verification thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("verification thread panicked")]
    WorkerPanicked,
}

pub type VerifyResult<T> = Result<T, VerifyError>;
