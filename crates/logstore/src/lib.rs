//! # Logstore - append-only, key-indexed JSON record store
//!
//! A log store is a flat file of newline-delimited JSON records plus an
//! in-memory index mapping each record's key to the byte range of its line.
//! After a single forward scan builds the index, every point lookup costs one
//! positioned read.
//!
//! ## File format
//!
//! ```text
//! offset  line                     index entry
//! 0       # sample\n               -            (comment, 9 bytes)
//! 9       \n                       -            (blank, 1 byte)
//! 10      {"Key":"a","v":1}\n      a -> (10, 18)
//! 28      {"Key":"b","v":2}\n      b -> (28, 18)
//! 46      {"v":3}\n                -            (no key, 8 bytes)
//! ```
//!
//! - One record per line, lines terminated by a single `\n`.
//! - The key is the string value of a fixed top-level field (`"Key"` by
//!   default, see [`StoreConfig`]).
//! - No header, footer or file-level metadata.
//!
//! ## Roles
//!
//! | Type          | Purpose                                                  |
//! |---------------|----------------------------------------------------------|
//! | [`LogWriter`] | create/truncate a log, append raw records, close         |
//! | [`LogReader`] | open + scan, `get`, `field`, `reindex`, `save_index`     |
//! | [`KeyIndex`]  | the derived key -> [`IndexEntry`] map built by the scan  |
//!
//! The writer never touches an index. A reader sees only what was on disk
//! when its scan ran; call [`LogReader::reindex`] to pick up later appends.
//!
//! ## Example
//!
//! ```rust,no_run
//! use logstore::{LogReader, LogWriter};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Row {
//!     v: i64,
//! }
//!
//! let mut w = LogWriter::create("store.log").unwrap();
//! w.append(br#"{"Key":"a","v":1}"#).unwrap();
//! w.append(br#"{"Key":"b","v":2}"#).unwrap();
//! w.close().unwrap();
//!
//! let r = LogReader::open("store.log").unwrap();
//! let b: Row = r.get("b").unwrap().expect("b was written");
//! assert_eq!(b.v, 2);
//! assert!(r.get::<Row>("c").unwrap().is_none());
//! ```

mod error;
mod field;
mod index;
mod reader;
mod writer;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use field::{Field, FieldPath};
pub use index::{IndexEntry, KeyIndex, ScanStats, INDEX_EXPORT_HEADER};
pub use reader::LogReader;
pub use writer::LogWriter;

#[cfg(test)]
mod tests;
