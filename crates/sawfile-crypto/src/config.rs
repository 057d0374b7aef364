use serde::{Deserialize, Serialize};

/// Configuration for the [`DigestEngine`](crate::DigestEngine).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Read buffer size in bytes (default: 1024).
    pub chunk_size: usize,
    /// File extensions (without the dot, matched case-insensitively) whose
    /// read failures are logged as warnings instead of failing the check.
    pub soft_fail_extensions: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            soft_fail_extensions: vec!["log".into(), "tmp".into(), "bak".into()],
        }
    }
}
