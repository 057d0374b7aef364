use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sawfile_crypto::DigestConfig;
use sawfile_ledger::LedgerConfig;
use sawfile_types::OpenMode;

use crate::error::{KeysError, KeysResult};

/// Everything needed to open a [`Keys`](crate::Keys) facade.
///
/// ```toml
/// ledger_path = "install.keys"
/// mode = "read-only"
/// required = ["bin/app.exe"]
///
/// [digest]
/// chunk_size = 4096
/// soft_fail_extensions = ["log", "avi"]
///
/// [ledger]
/// sync_mode = "every-write"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Backing ledger file.
    pub ledger_path: PathBuf,
    pub mode: OpenMode,
    pub digest: DigestConfig,
    pub ledger: LedgerConfig,
    /// Filenames that must be present in a ReadOnly ledger for it to pass.
    pub required: Vec<String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("install.keys"),
            mode: OpenMode::ReadOnly,
            digest: DigestConfig::default(),
            ledger: LedgerConfig::default(),
            required: Vec::new(),
        }
    }
}

impl KeysConfig {
    pub fn new(ledger_path: impl Into<PathBuf>, mode: OpenMode) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            mode,
            ..Default::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> KeysResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file. Relative `ledger_path` and `ledger.base_dir` are
    /// resolved against the file's directory.
    pub fn from_toml_file(path: &Path) -> KeysResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| KeysError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;

        if let Some(dir) = path.parent() {
            if config.ledger_path.is_relative() {
                config.ledger_path = dir.join(&config.ledger_path);
            }
            if let Some(base) = config.ledger.base_dir.as_mut().filter(|b| b.is_relative()) {
                *base = dir.join(&*base);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sawfile_ledger::SyncMode;

    #[test]
    fn default_config() {
        let c = KeysConfig::default();
        assert_eq!(c.mode, OpenMode::ReadOnly);
        assert_eq!(c.digest.chunk_size, 1024);
        assert!(c.required.is_empty());
        assert!(c.ledger.base_dir.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let c = KeysConfig::from_toml_str(
            r#"
            ledger_path = "cases/0001/case.keys"
            mode = "write-only"

            [ledger]
            sync_mode = "every-write"
            "#,
        )
        .unwrap();
        assert_eq!(c.ledger_path, PathBuf::from("cases/0001/case.keys"));
        assert_eq!(c.mode, OpenMode::WriteOnly);
        assert_eq!(c.ledger.sync_mode, SyncMode::EveryWrite);
        assert_eq!(c.digest, DigestConfig::default());
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(matches!(
            KeysConfig::from_toml_str(r#"mode = "append""#),
            Err(KeysError::ConfigParse(_))
        ));
    }

    #[test]
    fn file_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sawfile.toml");
        std::fs::write(
            &path,
            "ledger_path = \"install.keys\"\nrequired = [\"app.exe\"]\n[ledger]\nbase_dir = \"install\"\n",
        )
        .unwrap();

        let c = KeysConfig::from_toml_file(&path).unwrap();
        assert_eq!(c.ledger_path, dir.path().join("install.keys"));
        assert_eq!(c.ledger.base_dir, Some(dir.path().join("install")));
        assert_eq!(c.required, vec!["app.exe"]);
    }

    #[test]
    fn missing_file_is_config_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            KeysConfig::from_toml_file(&dir.path().join("absent.toml")),
            Err(KeysError::ConfigRead { .. })
        ));
    }
}
