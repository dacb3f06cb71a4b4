use std::io;

use thiserror::Error;

/// Errors that can occur during log store operations.
///
/// An absent key is not an error: lookups return `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The log (or an export target) could not be opened, created, read or
    /// written. Also covers positioned reads that run past end-of-file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record's bytes did not deserialize into the requested shape.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The writer refused a record that would not fit on one line.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A field path was empty or contained an empty segment.
    #[error("invalid field path: {0:?}")]
    InvalidFieldPath(String),
}

/// Shorthand for results carrying a [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
