use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use config::StoreConfig;

use crate::error::Result;
use crate::field::FieldPath;

/// First line of an exported index file.
pub const INDEX_EXPORT_HEADER: &str = "# logstore-index v1";

/// Location of one record's line within the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// Byte position where the line begins.
    pub offset: u64,
    /// Bytes the line occupies, including its trailing `\n`.
    pub length: u64,
}

impl IndexEntry {
    /// Length of the record without its line terminator.
    #[must_use]
    pub fn record_len(&self) -> u64 {
        self.length.saturating_sub(1)
    }
}

/// Counters collected during one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Physical lines read.
    pub lines: u64,
    /// Lines that produced an index entry (duplicates included).
    pub indexed: u64,
    /// Blank, comment, malformed or unkeyed lines.
    pub skipped: u64,
    /// Bytes consumed from the file.
    pub bytes: u64,
}

/// Key -> [`IndexEntry`] map derived from one forward scan of a log file.
///
/// The index owns its entries outright and is never patched: a fresh scan
/// replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex {
    entries: HashMap<String, IndexEntry>,
    stats: ScanStats,
}

impl KeyIndex {
    /// Builds an index by scanning `rdr` line by line from its current
    /// position, which is taken as offset 0.
    ///
    /// Every line advances the offset cursor by its full byte length,
    /// whether or not it yields an entry. A line yields an entry when it is
    /// neither blank nor a comment, parses as a JSON object, and carries a
    /// non-empty string under `config.key_field`. Later duplicates replace
    /// earlier ones.
    ///
    /// # Errors
    ///
    /// Any I/O error from `rdr` aborts the scan; the partial index is dropped.
    pub fn build_from_reader<R: BufRead>(mut rdr: R, config: &StoreConfig) -> Result<Self> {
        let key_path = FieldPath::top_level(&config.key_field);
        let mut entries = HashMap::new();
        let mut stats = ScanStats::default();
        let mut cursor: u64 = 0;

        // Reusable line buffer
        let mut line = Vec::with_capacity(256);

        loop {
            line.clear();
            let consumed = rdr.read_until(b'\n', &mut line)? as u64;
            if consumed == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            stats.lines += 1;

            // An unterminated final line is sized as if it had its `\n`, so
            // `record_len()` still covers exactly the line.
            let entry = IndexEntry {
                offset: cursor,
                length: line.len() as u64 + 1,
            };
            cursor += consumed;

            match extract_key(&line, &key_path, config.comment_marker) {
                Some(key) => {
                    entries.insert(key, entry);
                    stats.indexed += 1;
                }
                None => stats.skipped += 1,
            }
        }
        stats.bytes = cursor;

        Ok(Self { entries, stats })
    }

    /// Looks up the location of `key`.
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` has an entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no line produced an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters from the scan that built this index.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// All entries in physical file order (ascending offset).
    pub fn entries_in_file_order(&self) -> Vec<(&str, IndexEntry)> {
        let mut out: Vec<(&str, IndexEntry)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.as_str(), *e))
            .collect();
        out.sort_by_key(|(_, e)| e.offset);
        out
    }

    /// Writes the export format to `w`.
    ///
    /// ```text
    /// # logstore-index v1
    /// "a",10,18
    /// "b",28,18
    /// ```
    ///
    /// One entry per line in file order. Keys are JSON string literals so
    /// commas, quotes and newlines inside a key stay unambiguous.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(w, "{}", INDEX_EXPORT_HEADER)?;
        for (key, entry) in self.entries_in_file_order() {
            let quoted = serde_json::to_string(key)?;
            writeln!(w, "{},{},{}", quoted, entry.offset, entry.length)?;
        }
        Ok(())
    }

    /// Exports the index to `path` atomically (temp file, fsync, rename).
    ///
    /// The export is diagnostic only; nothing in this crate reads it back.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = tmp_path_for(path);
        {
            let f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            let mut w = BufWriter::new(f);
            self.write_to(&mut w)?;
            w.flush()?;
            w.get_ref().sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Extracts the record key from one line (terminator already stripped).
///
/// Returns `None` for blank lines, comment lines, lines that are not a
/// well-formed JSON document, and records whose key field is missing, not a
/// string, or empty once surrounding quote characters are trimmed.
fn extract_key(line: &[u8], key_path: &FieldPath, comment_marker: u8) -> Option<String> {
    match line.first() {
        None => return None,
        Some(&b) if b == comment_marker => return None,
        Some(_) => {}
    }

    let field = key_path.extract(line).ok()?;
    let key = field.as_str()?.trim_matches('"');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// `<path>.tmp` next to the target.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
