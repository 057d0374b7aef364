use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tracing::{debug, info, warn};

use sawfile_types::{Digest, LedgerEntry, OpenMode};

use crate::config::{LedgerConfig, SyncMode};
use crate::error::{LedgerError, LedgerResult};

/// Counts from parsing a backing file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Entries now in the in-memory map.
    pub entries: usize,
    /// Malformed lines that were skipped.
    pub skipped: usize,
    /// Lines repeating an already-loaded filename (first occurrence wins).
    pub duplicates: usize,
}

/// Internal mutable state for the ledger writer.
struct LedgerWriter {
    file: File,
    /// The file is non-empty and its last byte is not `\n`.
    needs_newline: bool,
}

/// Persisted `filename -> digest` ledger.
///
/// The in-memory map is loaded from the backing file on open (ReadOnly and
/// ReadWrite) and kept in step with every append and rewrite. All writes go
/// through a single mutex-guarded writer, so a ledger can be shared between
/// the append worker and callers through an `Arc`.
pub struct Ledger {
    path: PathBuf,
    base_dir: PathBuf,
    mode: OpenMode,
    config: LedgerConfig,
    entries: RwLock<HashMap<String, Digest>>,
    /// `None` for ReadOnly ledgers.
    writer: Option<Mutex<LedgerWriter>>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("path", &self.path)
            .field("base_dir", &self.base_dir)
            .field("mode", &self.mode)
            .field("entries", &self.len())
            .finish()
    }
}

impl Ledger {
    /// Open the ledger at `path`.
    ///
    /// ReadOnly requires the file to exist. Writable modes create it (and
    /// its parent directory) if missing. ReadOnly and ReadWrite parse the
    /// file; WriteOnly does not.
    pub fn open(path: &Path, mode: OpenMode, config: LedgerConfig) -> LedgerResult<Self> {
        let open_err = |source| LedgerError::Open {
            path: path.to_path_buf(),
            source,
        };

        let writer = if mode.can_write() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(open_err)?;
            }
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(open_err)?;
            let needs_newline = lacks_trailing_newline(&mut file).map_err(open_err)?;
            Some(Mutex::new(LedgerWriter {
                file,
                needs_newline,
            }))
        } else {
            None
        };

        let base_dir = match &config.base_dir {
            Some(dir) => dir.clone(),
            None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };

        let ledger = Self {
            path: path.to_path_buf(),
            base_dir,
            mode,
            config,
            entries: RwLock::new(HashMap::new()),
            writer,
        };

        if mode.can_read() {
            let summary = ledger.load()?;
            info!(
                path = %path.display(),
                %mode,
                entries = summary.entries,
                skipped = summary.skipped,
                "ledger loaded"
            );
        } else {
            info!(path = %path.display(), %mode, "ledger opened for append");
        }

        Ok(ledger)
    }

    /// Re-parse the backing file, replacing the in-memory map.
    pub fn reload(&self) -> LedgerResult<LoadSummary> {
        if !self.mode.can_read() {
            return Err(LedgerError::WriteOnly);
        }
        self.load()
    }

    fn load(&self) -> LedgerResult<LoadSummary> {
        // Hold the writer (if any) so no write lands mid-parse.
        let _writer = self
            .writer
            .as_ref()
            .map(|w| w.lock().expect("ledger writer mutex poisoned"));

        let file = File::open(&self.path).map_err(|source| LedgerError::Open {
            path: self.path.clone(),
            source,
        })?;
        let mut reader = BufReader::new(file);

        let mut map = HashMap::new();
        let mut summary = LoadSummary::default();
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;

            let Ok(line) = std::str::from_utf8(&buf) else {
                warn!(line = line_no, "ledger line is not UTF-8; skipping");
                summary.skipped += 1;
                continue;
            };

            match LedgerEntry::parse_line(line) {
                Ok(None) => {}
                Ok(Some(entry)) => {
                    if map.contains_key(&entry.filename) {
                        warn!(line = line_no, filename = %entry.filename, "duplicate ledger entry; keeping first");
                        summary.duplicates += 1;
                    } else {
                        map.insert(entry.filename, entry.digest);
                    }
                }
                Err(e) => {
                    warn!(line = line_no, error = %e, "malformed ledger line; skipping");
                    summary.skipped += 1;
                }
            }
        }

        summary.entries = map.len();
        *self.entries.write().expect("ledger map lock poisoned") = map;
        Ok(summary)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of entries in the in-memory map.
    pub fn len(&self) -> usize {
        self.entries.read().expect("ledger map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether at least one entry is loaded. Callers use this to decide
    /// whether verification should proceed at all.
    pub fn has_entries(&self) -> bool {
        !self.is_empty()
    }

    pub fn get(&self, filename: &str) -> Option<Digest> {
        self.entries
            .read()
            .expect("ledger map lock poisoned")
            .get(filename)
            .copied()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries
            .read()
            .expect("ledger map lock poisoned")
            .contains_key(filename)
    }

    /// Whether the backing file has a line for `filename`.
    ///
    /// Readable ledgers answer from the in-memory map. WriteOnly ledgers
    /// never loaded earlier content, so the file itself is scanned.
    pub fn has_entry(&self, filename: &str) -> LedgerResult<bool> {
        if self.contains(filename) {
            return Ok(true);
        }
        if self.mode.can_read() {
            return Ok(false);
        }
        let mut w = self.lock_writer()?;
        Ok(find_digest_offset(&mut w.file, filename)?.is_some())
    }

    /// Snapshot of all entries, sorted by filename.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        let map = self.entries.read().expect("ledger map lock poisoned");
        let mut entries: Vec<LedgerEntry> = map
            .iter()
            .map(|(name, digest)| LedgerEntry::new(name.clone(), *digest))
            .collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        entries
    }

    /// Location on disk of a ledger filename.
    pub fn full_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    /// Normalise a caller-supplied path to a ledger filename.
    ///
    /// Absolute paths must lie under the base directory and have it
    /// stripped. Separators become `/` and a leading `./` is dropped. A
    /// `..` segment is rejected even when the path would resolve back
    /// inside the base.
    pub fn relative_name(&self, path: &Path) -> LedgerResult<String> {
        let invalid = |reason: &str| LedgerError::InvalidPath {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let relative = if path.is_absolute() {
            let base_abs = if self.base_dir.as_os_str().is_empty() {
                std::env::current_dir()?
            } else {
                std::path::absolute(&self.base_dir)?
            };
            path.strip_prefix(&base_abs)
                .or_else(|_| path.strip_prefix(&self.base_dir))
                .map_err(|_| invalid("outside the ledger base directory"))?
        } else {
            path
        };

        let mut name = relative
            .to_str()
            .ok_or_else(|| invalid("not valid UTF-8"))?
            .replace('\\', "/");
        while let Some(rest) = name.strip_prefix("./") {
            name = rest.to_string();
        }
        if name.starts_with('/') || name.split('/').any(|segment| segment == "..") {
            return Err(invalid("escapes the ledger base directory"));
        }

        LedgerEntry::check_filename(&name).map_err(|e| invalid(&e.to_string()))?;
        Ok(name)
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Append an entry line to the end of the backing file.
    pub fn append(&self, entry: &LedgerEntry) -> LedgerResult<()> {
        LedgerEntry::check_filename(&entry.filename)?;
        let mut w = self.lock_writer()?;

        let mut line = String::with_capacity(entry.filename.len() + 44);
        if w.needs_newline {
            line.push('\n');
        }
        line.push_str(&entry.to_line());

        w.file.seek(SeekFrom::End(0))?;
        w.file.write_all(line.as_bytes())?;
        w.needs_newline = false;
        self.sync(&mut w.file)?;

        self.entries
            .write()
            .expect("ledger map lock poisoned")
            .entry(entry.filename.clone())
            .or_insert(entry.digest);

        debug!(filename = %entry.filename, digest = %entry.digest.short_hex(), "ledger append");
        Ok(())
    }

    /// Overwrite the digest of an existing line in place.
    ///
    /// Locates the first line whose filename matches exactly and rewrites
    /// its 40 hex characters. Returns `false`, leaving the file untouched,
    /// if no line matches.
    pub fn rewrite(&self, filename: &str, digest: &Digest) -> LedgerResult<bool> {
        let mut w = self.lock_writer()?;

        let Some(offset) = find_digest_offset(&mut w.file, filename)? else {
            debug!(filename, "ledger rewrite: no matching line");
            return Ok(false);
        };

        w.file.seek(SeekFrom::Start(offset))?;
        w.file.write_all(digest.to_hex().as_bytes())?;
        self.sync(&mut w.file)?;

        self.entries
            .write()
            .expect("ledger map lock poisoned")
            .insert(filename.to_string(), *digest);

        debug!(filename, offset, digest = %digest.short_hex(), "ledger rewrite");
        Ok(true)
    }

    fn lock_writer(&self) -> LedgerResult<std::sync::MutexGuard<'_, LedgerWriter>> {
        let writer = self.writer.as_ref().ok_or(LedgerError::ReadOnly)?;
        Ok(writer.lock().expect("ledger writer mutex poisoned"))
    }

    fn sync(&self, file: &mut File) -> LedgerResult<()> {
        file.flush()?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            file.sync_data()?;
        }
        Ok(())
    }
}

fn lacks_trailing_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Byte offset of the digest token on the first line naming `filename`.
fn find_digest_offset(file: &mut File, filename: &str) -> std::io::Result<Option<u64>> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut offset = 0u64;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }

        if let Ok(line) = std::str::from_utf8(&buf) {
            if let Ok(Some(entry)) = LedgerEntry::parse_line(line) {
                if entry.filename == filename {
                    let indent = line.len() - line.trim_start().len();
                    return Ok(Some(offset + indent as u64));
                }
            }
        }
        offset += n as u64;
    }
}
