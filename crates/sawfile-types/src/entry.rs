//! Ledger entries and their text-line representation.
//!
//! On disk a ledger is one entry per line:
//!
//! ```text
//! <40-hex-char digest><whitespace run><filename>\n
//! ```
//!
//! The first whitespace-delimited token is the digest and everything after
//! the first whitespace run (trimmed) is the filename, so filenames may
//! contain embedded spaces. Blank lines carry no entry.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::TypeError;

/// Separator written between digest and filename.
const SEPARATOR: &str = "  ";

/// A single `filename -> digest` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Path relative to the ledger's base directory, `/`-separated.
    pub filename: String,
    /// Digest of the file content when it was registered.
    pub digest: Digest,
}

impl LedgerEntry {
    /// Create a new entry.
    pub fn new(filename: impl Into<String>, digest: Digest) -> Self {
        Self {
            filename: filename.into(),
            digest,
        }
    }

    /// Render the entry as a ledger line, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}{}{}\n", self.digest, SEPARATOR, self.filename)
    }

    /// Parse one ledger line.
    ///
    /// Returns `Ok(None)` for a blank line and `Err` for a malformed one.
    pub fn parse_line(line: &str) -> Result<Option<Self>, TypeError> {
        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() {
            return Ok(None);
        }

        let split = trimmed
            .find(char::is_whitespace)
            .ok_or(TypeError::MissingFilename)?;
        let (token, rest) = trimmed.split_at(split);
        let digest = Digest::from_hex(token)?;

        let filename = rest.trim();
        if filename.is_empty() {
            return Err(TypeError::MissingFilename);
        }

        Ok(Some(Self::new(filename, digest)))
    }

    /// Check that `name` survives a write/parse cycle unchanged.
    ///
    /// The reader trims the filename and splits on line breaks, so names
    /// that are empty, contain a line break, or start/end with whitespace
    /// cannot be stored.
    pub fn check_filename(name: &str) -> Result<(), TypeError> {
        let reason = if name.is_empty() {
            "empty name"
        } else if name.contains(|c: char| c == '\n' || c == '\r') {
            "contains a line break"
        } else if name.trim() != name {
            "leading or trailing whitespace"
        } else {
            return Ok(());
        };
        Err(TypeError::InvalidFilename {
            name: name.to_string(),
            reason,
        })
    }
}
