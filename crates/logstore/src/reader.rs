use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use config::StoreConfig;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::field::{Field, FieldPath};
use crate::index::{IndexEntry, KeyIndex, ScanStats};

/// Reads a log file for point lookups by key.
///
/// On [`open`](LogReader::open) the whole file is scanned once to build a
/// [`KeyIndex`]. After that each lookup is a single seek + read of exactly
/// one record's bytes.
///
/// One file handle is kept open for the lifetime of the reader, wrapped in a
/// `Mutex` so that lookups can go through a shared `&self` reference from
/// several threads. The handle is released when the reader is dropped.
///
/// The index is a snapshot: records appended after the scan are invisible
/// until [`reindex`](LogReader::reindex) is called.
pub struct LogReader {
    path: PathBuf,
    config: StoreConfig,
    index: KeyIndex,
    /// Persistent file handle used for scans and positioned reads.
    file: Mutex<File>,
}

impl LogReader {
    /// Opens `path` with the default [`StoreConfig`] and builds its index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened or a read
    /// fails during the scan. No reader is returned in that case.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens `path` and builds its index using `config`'s key field and
    /// comment marker.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let index = scan(&mut file, &config)?;

        let stats = index.stats();
        debug!(
            path = %path.display(),
            entries = index.len(),
            lines = stats.lines,
            skipped = stats.skipped,
            bytes = stats.bytes,
            "indexed log file"
        );

        Ok(Self {
            path,
            config,
            index,
            file: Mutex::new(file),
        })
    }

    /// Rebuilds the index from the current contents of the file.
    ///
    /// The new index replaces the old one only if the scan succeeds; on
    /// error the previous index stays in place.
    pub fn reindex(&mut self) -> Result<()> {
        let file = self
            .file
            .get_mut()
            .map_err(|e| poisoned(&e.to_string()))?;
        let index = scan(file, &self.config)?;

        debug!(
            path = %self.path.display(),
            before = self.index.len(),
            after = index.len(),
            "reindexed log file"
        );
        self.index = index;
        Ok(())
    }

    /// Point lookup that deserializes the record into `T`.
    ///
    /// Returns `Ok(None)` if `key` has no index entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] if the positioned read fails (including a file
    /// truncated since the scan), [`StoreError::Parse`] if the bytes do not
    /// deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Point lookup returning the record's bytes without the line terminator.
    pub fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = match self.index.get(key) {
            Some(e) => *e,
            None => return Ok(None),
        };
        self.read_entry(&entry).map(Some)
    }

    /// Extracts one field from the record stored under `key`.
    ///
    /// `path` is dot-separated (see [`FieldPath`]). Only the addressed value
    /// is materialized; the rest of the record is skipped.
    ///
    /// Returns `Ok(None)` if `key` has no index entry, and
    /// `Ok(Some(field))` with `field.exists() == false` if the record exists
    /// but the path does not resolve.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidFieldPath`] for a malformed path,
    /// [`StoreError::Io`] on read failure, [`StoreError::Parse`] if the
    /// record is not well-formed JSON.
    pub fn field(&self, key: &str, path: &str) -> Result<Option<Field>> {
        let path = FieldPath::parse(path)?;
        self.field_at(key, &path)
    }

    /// Like [`field`](LogReader::field) with a pre-parsed path.
    pub fn field_at(&self, key: &str, path: &FieldPath) -> Result<Option<Field>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(path.extract(&raw)?)),
            None => Ok(None),
        }
    }

    /// Exports every `(key, offset, length)` triple to `path`.
    ///
    /// See [`KeyIndex::write_to`] for the format. This is a diagnostic
    /// artifact: readers always rebuild their index from the log itself.
    pub fn save_index<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.index.save(path)?;
        debug!(
            path = %path.display(),
            entries = self.index.len(),
            "exported index"
        );
        Ok(())
    }

    /// The location of `key`'s record, if indexed.
    pub fn entry(&self, key: &str) -> Option<IndexEntry> {
        self.index.get(key).copied()
    }

    /// Returns `true` if `key` is indexed.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Indexed keys in physical file order.
    pub fn keys(&self) -> Vec<&str> {
        self.index
            .entries_in_file_order()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    /// The in-memory index.
    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    /// Counters from the most recent scan.
    pub fn scan_stats(&self) -> ScanStats {
        self.index.stats()
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The config this reader was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Positioned read of `entry.record_len()` bytes at `entry.offset`.
    fn read_entry(&self, entry: &IndexEntry) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; entry.record_len() as usize];
        let mut f = self.lock_file()?;
        f.seek(SeekFrom::Start(entry.offset))?;
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn lock_file(&self) -> Result<MutexGuard<'_, File>> {
        self.file.lock().map_err(|e| poisoned(&e.to_string()))
    }
}

impl std::fmt::Debug for LogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.index.stats();
        f.debug_struct("LogReader")
            .field("path", &self.path)
            .field("key_field", &self.config.key_field)
            .field("entries", &self.index.len())
            .field("lines", &stats.lines)
            .field("skipped", &stats.skipped)
            .field("bytes", &stats.bytes)
            .finish()
    }
}

/// Scans `file` from offset 0.
fn scan(file: &mut File, config: &StoreConfig) -> Result<KeyIndex> {
    file.seek(SeekFrom::Start(0))?;
    KeyIndex::build_from_reader(BufReader::new(file), config)
}

fn poisoned(msg: &str) -> StoreError {
    StoreError::Io(io::Error::other(format!("lock poisoned: {}", msg)))
}
