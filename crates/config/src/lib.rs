//! # Config - shared log store conventions
//!
//! The writer and reader of a log file must agree on a handful of on-disk
//! conventions: which JSON field carries the record key and which leading
//! byte marks a comment line. [`StoreConfig`] carries those, plus the
//! writer's fsync policy.
//!
//! Binaries load it from the environment:
//!
//! ```text
//! LOGSTORE_KEY_FIELD       key field name            (default: "Key")
//! LOGSTORE_COMMENT_MARKER  comment line marker       (default: "#")
//! LOGSTORE_SYNC            fsync every append        (default: "false")
//! ```

/// Default name of the JSON field holding a record's key.
pub const DEFAULT_KEY_FIELD: &str = "Key";

/// Default leading byte of a comment line.
pub const DEFAULT_COMMENT_MARKER: u8 = b'#';

/// Settings shared by `LogWriter` and `LogReader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the top-level JSON field whose string value is the record key.
    pub key_field: String,
    /// Lines starting with this byte carry no record.
    pub comment_marker: u8,
    /// If true, the writer fsyncs after every append.
    pub sync_on_append: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            comment_marker: DEFAULT_COMMENT_MARKER,
            sync_on_append: false,
        }
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl StoreConfig {
    /// Builds a config from `LOGSTORE_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the defaults. An empty
    /// `LOGSTORE_KEY_FIELD` is treated as missing.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let key_field = env_or("LOGSTORE_KEY_FIELD", DEFAULT_KEY_FIELD);
        let key_field = if key_field.is_empty() {
            defaults.key_field
        } else {
            key_field
        };

        let comment_marker = std::env::var("LOGSTORE_COMMENT_MARKER")
            .ok()
            .and_then(|v| v.as_bytes().first().copied())
            .unwrap_or(defaults.comment_marker);

        let sync_on_append: bool = env_or("LOGSTORE_SYNC", "false")
            .parse()
            .unwrap_or(defaults.sync_on_append);

        Self {
            key_field,
            comment_marker,
            sync_on_append,
        }
    }

    /// Sets the key field name.
    #[must_use]
    pub fn with_key_field(mut self, key_field: impl Into<String>) -> Self {
        self.key_field = key_field.into();
        self
    }

    /// Sets the comment marker byte.
    #[must_use]
    pub fn with_comment_marker(mut self, marker: u8) -> Self {
        self.comment_marker = marker;
        self
    }

    /// Sets whether the writer fsyncs after every append.
    #[must_use]
    pub fn with_sync_on_append(mut self, sync: bool) -> Self {
        self.sync_on_append = sync;
        self
    }
}
