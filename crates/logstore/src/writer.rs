use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use config::StoreConfig;
use serde::Serialize;
use tracing::warn;

use crate::error::{Result, StoreError};

/// Append-only log writer.
///
/// Each record is copied into a scratch buffer, followed by `\n`, and
/// written straight to the file with a single `write_all`, so a failed write
/// is reported by the `append` that caused it. When `sync_on_append` is set
/// every append is followed by `sync_data()`.
///
/// The writer keeps no index. Readers see new records only after they
/// (re)scan the file. Call [`close`](LogWriter::close) before handing the
/// file to a reader to make the records durable.
pub struct LogWriter {
    path: PathBuf,
    file: File,
    sync: bool,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
    bytes_written: u64,
    records_written: u64,
}

impl LogWriter {
    /// Creates (or truncates) a log file at `path` with the default config.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on permission or path errors.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_config(path, &StoreConfig::default())
    }

    /// Creates (or truncates) a log file at `path`, taking the fsync policy
    /// from `config`.
    pub fn create_with_config<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file,
            sync: config.sync_on_append,
            buf: Vec::with_capacity(256),
            bytes_written: 0,
            records_written: 0,
        })
    }

    /// Appends pre-serialized record bytes followed by a line terminator.
    ///
    /// The bytes are not checked for a key field or for valid JSON; an
    /// unkeyed or malformed record is simply skipped by later scans. The one
    /// check made is that `raw` holds no `\n`, since an embedded terminator
    /// would split the record into two lines and shift the framing of every
    /// line after it.
    ///
    /// A failed write is logged and returned, and the writer stays usable
    /// for further appends. Stricter callers should stop writing on error.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidRecord`] if `raw` contains a `\n` (it would split
    /// into two lines), [`StoreError::Io`] if the write fails.
    pub fn append(&mut self, raw: &[u8]) -> Result<()> {
        if let Some(pos) = raw.iter().position(|&b| b == b'\n') {
            return Err(StoreError::InvalidRecord(format!(
                "line terminator at byte {} of {}",
                pos,
                raw.len()
            )));
        }

        self.buf.clear();
        self.buf.extend_from_slice(raw);
        self.buf.push(b'\n');

        if let Err(e) = self.write_buf() {
            warn!(
                component = "logstore",
                path = %self.path.display(),
                error = %e,
                "append failed"
            );
            return Err(e.into());
        }

        self.bytes_written += self.buf.len() as u64;
        self.records_written += 1;
        Ok(())
    }

    /// Serializes `record` as compact JSON and appends it.
    pub fn append_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let raw = serde_json::to_vec(record)
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        self.append(&raw)
    }

    /// Fsyncs the file so every appended record is durable.
    pub fn sync_to_disk(&mut self) -> Result<()> {
        if let Err(e) = self.file.sync_all() {
            warn!(
                component = "logstore",
                path = %self.path.display(),
                error = %e,
                "sync failed"
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Fsyncs and releases the file handle.
    pub fn close(mut self) -> Result<()> {
        self.sync_to_disk()
    }

    /// Bytes successfully appended so far, terminators included.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Records successfully appended so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_buf(&mut self) -> io::Result<()> {
        self.file.write_all(&self.buf)?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }
}
