//! # CLI - Logstore Interactive Shell
//!
//! A REPL-style command-line interface over one log file. Reads commands
//! from stdin, executes them, and prints results to stdout. Designed for
//! both interactive use and scripted testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! CREATE             Create (truncate) the log and open a writer
//! APPEND json        Append one raw record line
//! CLOSE              Flush, fsync and close the writer
//! OPEN               Open a reader and scan the log
//! GET key            Print the record stored under key (or "(nil)")
//! FIELD key path     Print one field of a record (dot path)
//! REINDEX            Rescan the log to pick up new records
//! SAVE path          Export the index to path
//! KEYS               List indexed keys with offset+length
//! STATS              Print writer/reader state
//! EXIT / QUIT        Shut down
//! ```
//!
//! ## Configuration
//!
//! ```text
//! LOGSTORE_PATH            log file path        (default: "store.log")
//! LOGSTORE_KEY_FIELD       key field name       (default: "Key")
//! LOGSTORE_COMMENT_MARKER  comment marker       (default: "#")
//! LOGSTORE_SYNC            fsync every append   (default: "false")
//! RUST_LOG                 log filter, stderr   (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p logstore-cli
//! logstore started (path=store.log, key_field=Key)
//! > CREATE
//! OK
//! > APPEND {"Key":"a","v":1}
//! OK
//! > CLOSE
//! OK (1 records, 18 bytes)
//! > OPEN
//! OK (1 keys)
//! > FIELD a v
//! 1
//! > EXIT
//! bye
//! ```

mod session;

use anyhow::Result;
use config::StoreConfig;
use session::{Reply, Session};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let path = env_or("LOGSTORE_PATH", "store.log");
    let config = StoreConfig::from_env();

    println!(
        "logstore started (path={}, key_field={})",
        path, config.key_field
    );
    println!("Commands: CREATE | APPEND json | CLOSE | OPEN | GET key | FIELD key path");
    println!("          REINDEX | SAVE path | KEYS | STATS | EXIT");

    let mut session = Session::new(&path, config);
    tracing::debug!(path = %session.path().display(), "session ready");

    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match session.execute(&line) {
            Reply::Output(text) => {
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Reply::Exit => {
                println!("bye");
                break;
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
