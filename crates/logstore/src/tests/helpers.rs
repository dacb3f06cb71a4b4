use std::io::Cursor;
use std::path::Path;

use crate::{KeyIndex, StoreConfig};

/// Writes `lines` to `path`, each followed by `\n`.
pub fn write_lines(path: &Path, lines: &[&str]) {
    let mut data = String::new();
    for l in lines {
        data.push_str(l);
        data.push('\n');
    }
    std::fs::write(path, data).unwrap();
}

/// Scans an in-memory log with the default config.
pub fn index_bytes(data: &[u8]) -> KeyIndex {
    KeyIndex::build_from_reader(Cursor::new(data.to_vec()), &StoreConfig::default()).unwrap()
}
