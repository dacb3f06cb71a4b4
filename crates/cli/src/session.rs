use std::path::{Path, PathBuf};

use config::StoreConfig;
use logstore::{LogReader, LogWriter};
use tracing::info;

/// Result of executing one shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to print (may span several lines, never ends with `\n`).
    Output(String),
    /// The user asked to leave.
    Exit,
}

fn out(s: impl Into<String>) -> Reply {
    Reply::Output(s.into())
}

/// One shell session over a single log file.
///
/// Holds at most one writer and one reader. They are not coordinated: a
/// reader sees only what its last scan found, so records appended after
/// `OPEN` stay invisible until `REINDEX`.
pub struct Session {
    path: PathBuf,
    config: StoreConfig,
    writer: Option<LogWriter>,
    reader: Option<LogReader>,
}

impl Session {
    pub fn new<P: AsRef<Path>>(path: P, config: StoreConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            writer: None,
            reader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses and executes one input line.
    pub fn execute(&mut self, line: &str) -> Reply {
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };
        if cmd.is_empty() {
            return out("");
        }

        match cmd.to_uppercase().as_str() {
            "CREATE" => self.create(),
            "APPEND" => self.append(rest),
            "CLOSE" => self.close(),
            "OPEN" => self.open(),
            "GET" => self.get(rest),
            "FIELD" => self.field(rest),
            "REINDEX" => self.reindex(),
            "SAVE" => self.save(rest),
            "KEYS" => self.keys(),
            "STATS" => self.stats(),
            "EXIT" | "QUIT" => Reply::Exit,
            other => out(format!("unknown command: {}", other)),
        }
    }

    fn create(&mut self) -> Reply {
        if self.writer.is_some() {
            return out("ERR writer already open (use CLOSE)");
        }
        match LogWriter::create_with_config(&self.path, &self.config) {
            Ok(w) => {
                info!(path = %self.path.display(), "created log");
                self.writer = Some(w);
                out("OK")
            }
            Err(e) => out(format!("ERR create failed: {}", e)),
        }
    }

    fn append(&mut self, record: &str) -> Reply {
        if record.is_empty() {
            return out("ERR usage: APPEND <json>");
        }
        let w = match self.writer.as_mut() {
            Some(w) => w,
            None => return out("ERR no writer (use CREATE)"),
        };
        match w.append(record.as_bytes()) {
            Ok(()) => out("OK"),
            Err(e) => out(format!("ERR append failed: {}", e)),
        }
    }

    fn close(&mut self) -> Reply {
        let w = match self.writer.take() {
            Some(w) => w,
            None => return out("ERR no writer"),
        };
        let (records, bytes) = (w.records_written(), w.bytes_written());
        match w.close() {
            Ok(()) => out(format!("OK ({} records, {} bytes)", records, bytes)),
            Err(e) => out(format!("ERR close failed: {}", e)),
        }
    }

    fn open(&mut self) -> Reply {
        match LogReader::open_with_config(&self.path, self.config.clone()) {
            Ok(r) => {
                let n = r.len();
                self.reader = Some(r);
                out(format!("OK ({} keys)", n))
            }
            Err(e) => out(format!("ERR open failed: {}", e)),
        }
    }

    fn get(&self, key: &str) -> Reply {
        if key.is_empty() {
            return out("ERR usage: GET <key>");
        }
        let r = match self.reader.as_ref() {
            Some(r) => r,
            None => return out("ERR no reader (use OPEN)"),
        };
        match r.get_raw(key) {
            Ok(Some(raw)) => out(String::from_utf8_lossy(&raw)),
            Ok(None) => out("(nil)"),
            Err(e) => out(format!("ERR read failed: {}", e)),
        }
    }

    fn field(&self, args: &str) -> Reply {
        let mut parts = args.split_whitespace();
        let (key, path) = match (parts.next(), parts.next()) {
            (Some(k), Some(p)) => (k, p),
            _ => return out("ERR usage: FIELD <key> <path>"),
        };
        let r = match self.reader.as_ref() {
            Some(r) => r,
            None => return out("ERR no reader (use OPEN)"),
        };
        match r.field(key, path) {
            Ok(Some(f)) => match f.value() {
                Some(v) => out(v.to_string()),
                None => out("(absent)"),
            },
            Ok(None) => out("(nil)"),
            Err(e) => out(format!("ERR field failed: {}", e)),
        }
    }

    fn reindex(&mut self) -> Reply {
        let r = match self.reader.as_mut() {
            Some(r) => r,
            None => return out("ERR no reader (use OPEN)"),
        };
        match r.reindex() {
            Ok(()) => out(format!("OK ({} keys)", r.len())),
            Err(e) => out(format!("ERR reindex failed: {}", e)),
        }
    }

    fn save(&self, target: &str) -> Reply {
        if target.is_empty() {
            return out("ERR usage: SAVE <path>");
        }
        let r = match self.reader.as_ref() {
            Some(r) => r,
            None => return out("ERR no reader (use OPEN)"),
        };
        match r.save_index(target) {
            Ok(()) => out("OK"),
            Err(e) => out(format!("ERR save failed: {}", e)),
        }
    }

    fn keys(&self) -> Reply {
        let r = match self.reader.as_ref() {
            Some(r) => r,
            None => return out("ERR no reader (use OPEN)"),
        };
        if r.is_empty() {
            return out("(empty)");
        }
        let mut lines: Vec<String> = r
            .keys()
            .into_iter()
            .filter_map(|key| {
                r.entry(key)
                    .map(|e| format!("{} @ {}+{}", key, e.offset, e.length))
            })
            .collect();
        lines.push(format!("({} keys)", r.len()));
        out(lines.join("\n"))
    }

    fn stats(&self) -> Reply {
        let writer = match &self.writer {
            Some(w) => format!(
                "writer: records={} bytes={}",
                w.records_written(),
                w.bytes_written()
            ),
            None => "writer: (closed)".to_string(),
        };
        let reader = match &self.reader {
            Some(r) => format!("reader: {:?}", r),
            None => "reader: (closed)".to_string(),
        };
        out(format!(
            "path={}\n{}\n{}",
            self.path.display(),
            writer,
            reader
        ))
    }
}
