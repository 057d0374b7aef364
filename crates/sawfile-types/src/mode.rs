use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// How a ledger's backing file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMode {
    /// Verification only (e.g. checking installed software). The backing
    /// file is never written.
    ReadOnly,
    /// Append only (e.g. building a new case ledger). Prior content is not
    /// parsed and is invisible to the in-memory map.
    WriteOnly,
    /// Parse existing content and allow appends and in-place rewrites.
    ReadWrite,
}

impl OpenMode {
    /// Whether the backing file is parsed on open.
    pub fn can_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Whether appends and rewrites are permitted.
    pub fn can_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::WriteOnly => "write-only",
            Self::ReadWrite => "read-write",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpenMode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only" | "ro" => Ok(Self::ReadOnly),
            "write-only" | "wo" => Ok(Self::WriteOnly),
            "read-write" | "rw" => Ok(Self::ReadWrite),
            other => Err(TypeError::UnknownMode(other.to_string())),
        }
    }
}

/// Facade status after open and verification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Ledger opened and, where checked, every entry verified.
    #[default]
    Ok,
    /// The ledger could not be opened or read.
    FileError,
    /// One or more entries failed verification.
    CryptoError,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::FileError => "file error",
            Self::CryptoError => "crypto error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_capabilities() {
        assert!(OpenMode::ReadOnly.can_read());
        assert!(!OpenMode::ReadOnly.can_write());
        assert!(!OpenMode::WriteOnly.can_read());
        assert!(OpenMode::WriteOnly.can_write());
        assert!(OpenMode::ReadWrite.can_read());
        assert!(OpenMode::ReadWrite.can_write());
    }

    #[test]
    fn mode_parses_long_and_short_names() {
        assert_eq!("read-only".parse::<OpenMode>().unwrap(), OpenMode::ReadOnly);
        assert_eq!("wo".parse::<OpenMode>().unwrap(), OpenMode::WriteOnly);
        assert_eq!("rw".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert!(matches!(
            "append".parse::<OpenMode>(),
            Err(TypeError::UnknownMode(_))
        ));
    }

    #[test]
    fn mode_serde_is_kebab_case() {
        let json = serde_json::to_string(&OpenMode::ReadWrite).unwrap();
        assert_eq!(json, "\"read-write\"");
        assert_eq!(OpenMode::ReadWrite.to_string(), "read-write");
    }

    #[test]
    fn default_status_is_ok() {
        assert!(Status::default().is_ok());
        assert!(!Status::CryptoError.is_ok());
    }
}
