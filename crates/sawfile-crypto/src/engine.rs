use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use sha1::{Digest as _, Sha1};
use tracing::{debug, warn};

use sawfile_types::{Digest, DIGEST_LEN};

use crate::config::DigestConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::io_lock::disk_io_guard;

/// Streaming SHA-1 file digester.
///
/// The engine is stateless apart from its configuration and can be shared
/// freely between threads; concurrent `compute_file` calls queue on the
/// process-wide disk-I/O lock.
#[derive(Clone, Debug, Default)]
pub struct DigestEngine {
    config: DigestConfig,
}

impl DigestEngine {
    pub fn new(config: DigestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Digest of an in-memory byte slice.
    pub fn compute_bytes(data: &[u8]) -> Digest {
        let mut hasher = Sha1::new();
        hasher.update(data);
        finish(hasher)
    }

    /// Digest of everything `reader` yields, read in `chunk_size` pieces.
    pub fn compute_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; self.config.chunk_size.max(1)];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => hasher.update(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(finish(hasher))
    }

    /// Digest of the file at `path`.
    ///
    /// A read failure is an error unless the file's extension is soft-fail,
    /// in which case it is logged and the null digest is returned.
    pub fn compute_file(&self, path: &Path) -> CryptoResult<Digest> {
        let result = {
            let _io = disk_io_guard();
            File::open(path).and_then(|file| self.compute_reader(file))
        };

        match result {
            Ok(digest) => {
                debug!(path = %path.display(), digest = %digest.short_hex(), "file digested");
                Ok(digest)
            }
            Err(source) if self.is_soft_fail(path) => {
                warn!(path = %path.display(), error = %source, "soft-fail file unreadable");
                Ok(Digest::null())
            }
            Err(source) => Err(CryptoError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Returns `true` if the file at `path` currently hashes to `expected`.
    pub fn verify_file(&self, path: &Path, expected: &Digest) -> CryptoResult<bool> {
        Ok(self.compute_file(path)? == *expected)
    }

    /// Whether read failures for `path` are demoted to warnings.
    pub fn is_soft_fail(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.config
            .soft_fail_extensions
            .iter()
            .any(|soft| soft.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

fn finish(hasher: Sha1) -> Digest {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    Digest::from_hash(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn known_vectors() {
        assert_eq!(DigestEngine::compute_bytes(b"hello").to_hex(), HELLO_SHA1);
        assert_eq!(DigestEngine::compute_bytes(b"").to_hex(), EMPTY_SHA1);
    }

    #[test]
    fn file_digest_matches_in_memory_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.exe");
        fs::write(&path, b"hello").unwrap();

        let engine = DigestEngine::default();
        assert_eq!(engine.compute_file(&path).unwrap().to_hex(), HELLO_SHA1);
    }

    #[test]
    fn chunk_size_does_not_change_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = DigestEngine::compute_bytes(&data);

        for chunk_size in [1, 7, 1024, 4096, 65_536] {
            let engine = DigestEngine::new(DigestConfig {
                chunk_size,
                ..DigestConfig::default()
            });
            assert_eq!(engine.compute_reader(&data[..]).unwrap(), expected);
        }
    }

    #[test]
    fn digest_is_deterministic_and_byte_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"calibration table v1").unwrap();

        let engine = DigestEngine::default();
        let first = engine.compute_file(&path).unwrap();
        let second = engine.compute_file(&path).unwrap();
        assert_eq!(first, second);

        fs::write(&path, b"calibration table v2").unwrap();
        assert_ne!(engine.compute_file(&path).unwrap(), first);
    }

    #[test]
    fn missing_critical_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DigestEngine::default();
        let err = engine.compute_file(&dir.path().join("critical.bin")).unwrap_err();
        assert!(matches!(err, CryptoError::Read { .. }));
    }

    #[test]
    fn missing_soft_fail_file_yields_null_digest() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DigestEngine::default();
        let digest = engine.compute_file(&dir.path().join("session.LOG")).unwrap();
        assert!(digest.is_null());
    }

    #[test]
    fn soft_fail_classification() {
        let engine = DigestEngine::new(DigestConfig {
            soft_fail_extensions: vec![".avi".into(), "log".into()],
            ..DigestConfig::default()
        });
        assert!(engine.is_soft_fail(Path::new("cases/1/video.AVI")));
        assert!(engine.is_soft_fail(Path::new("run.log")));
        assert!(!engine.is_soft_fail(Path::new("app.exe")));
        assert!(!engine.is_soft_fail(Path::new("Makefile")));
    }

    #[test]
    fn verify_file_compares_against_expected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.exe");
        fs::write(&path, b"hello").unwrap();

        let engine = DigestEngine::default();
        let expected = Digest::from_hex(HELLO_SHA1).unwrap();
        assert!(engine.verify_file(&path, &expected).unwrap());

        fs::write(&path, b"hello!").unwrap();
        assert!(!engine.verify_file(&path, &expected).unwrap());
    }
}
