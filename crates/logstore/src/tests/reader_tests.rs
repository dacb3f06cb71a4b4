use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;
use tempfile::tempdir;

use super::helpers::write_lines;
use crate::*;

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    #[serde(rename = "Key")]
    key: String,
    v: i64,
}

fn write_ab(path: &std::path::Path) -> Result<()> {
    let mut w = LogWriter::create(path)?;
    w.append(br#"{"Key":"a","v":1}"#)?;
    w.append(br#"{"Key":"b","v":2}"#)?;
    w.close()?;
    Ok(())
}

// -------------------- Open & lookup --------------------

#[test]
fn open_and_lookup_written_records() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let r = LogReader::open(&path)?;
    assert_eq!(r.len(), 2);
    assert!(!r.is_empty());

    let b: Row = r.get("b")?.expect("b must exist");
    assert_eq!(b, Row { key: "b".into(), v: 2 });

    assert!(r.get::<Row>("c")?.is_none());
    Ok(())
}

#[test]
fn get_raw_returns_appended_bytes_without_terminator() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let r = LogReader::open(&path)?;
    assert_eq!(r.get_raw("a")?, Some(br#"{"Key":"a","v":1}"#.to_vec()));
    assert_eq!(r.get_raw("zzz")?, None);
    Ok(())
}

#[test]
fn open_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let res = LogReader::open(dir.path().join("nope.log"));
    assert!(matches!(res, Err(StoreError::Io(_))));
}

#[test]
fn lookup_into_wrong_shape_is_parse_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(&path, &[r#"{"Key":"a","v":"not a number"}"#]);

    let r = LogReader::open(&path)?;
    let res = r.get::<Row>("a");
    assert!(matches!(res, Err(StoreError::Parse(_))));

    // The failure is local to that lookup.
    assert_eq!(r.len(), 1);
    assert!(r.field("a", "v")?.unwrap().exists());
    Ok(())
}

#[test]
fn lookup_after_skipped_lines() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(&path, &["# comment", "", r#"{"Key":"x","v":9}"#]);

    let r = LogReader::open(&path)?;
    assert_eq!(r.len(), 1);
    assert_eq!(r.entry("x"), Some(IndexEntry { offset: 11, length: 18 }));
    assert_eq!(r.get::<Row>("x")?.unwrap().v, 9);

    let stats = r.scan_stats();
    assert_eq!(stats.lines, 3);
    assert_eq!(stats.skipped, 2);
    Ok(())
}

#[test]
fn duplicate_key_reads_latest_record() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(
        &path,
        &[r#"{"Key":"k","v":1}"#, r#"{"Key":"k","v":2}"#],
    );

    let r = LogReader::open(&path)?;
    assert_eq!(r.len(), 1);
    assert_eq!(r.get::<Row>("k")?.unwrap().v, 2);
    assert_eq!(r.entry("k").unwrap().offset, 18);
    Ok(())
}

#[test]
fn every_entry_window_reads_back_its_line() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    {
        let mut w = LogWriter::create(&path)?;
        for i in 0..200 {
            w.append_record(&json!({"Key": format!("key{}", i), "pad": "x".repeat(i % 17)}))?;
            if i % 10 == 0 {
                w.append(b"# checkpoint")?;
            }
        }
        w.close()?;
    }

    let data = fs::read(&path)?;
    let r = LogReader::open(&path)?;
    assert_eq!(r.len(), 200);

    let mut last_offset = None;
    for key in r.keys() {
        let e = r.entry(key).unwrap();
        if let Some(prev) = last_offset {
            assert!(e.offset > prev, "offsets increase in file order");
        }
        last_offset = Some(e.offset);

        let start = e.offset as usize;
        let line = &data[start..start + e.length as usize];
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(r.get_raw(key)?.unwrap(), &line[..line.len() - 1]);
    }
    Ok(())
}

#[test]
fn keys_are_in_file_order() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(
        &path,
        &[r#"{"Key":"zeta"}"#, r#"{"Key":"alpha"}"#, r#"{"Key":"mid"}"#],
    );

    let r = LogReader::open(&path)?;
    assert_eq!(r.keys(), vec!["zeta", "alpha", "mid"]);
    Ok(())
}

#[test]
fn custom_config_reader() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(&path, &["// note", r#"{"id":"n1","v":5}"#]);

    let cfg = StoreConfig::default()
        .with_key_field("id")
        .with_comment_marker(b'/');
    let r = LogReader::open_with_config(&path, cfg)?;
    assert_eq!(r.config().key_field, "id");
    assert_eq!(r.field("n1", "v")?.unwrap().as_i64(), Some(5));
    Ok(())
}

// -------------------- Field lookup --------------------

#[test]
fn field_lookup_reads_single_value() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let r = LogReader::open(&path)?;
    let v = r.field("a", "v")?.expect("a exists");
    assert!(v.exists());
    assert_eq!(v.as_i64(), Some(1));

    assert!(r.field("c", "v")?.is_none());
    Ok(())
}

#[test]
fn field_lookup_nested_paths() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(
        &path,
        &[r#"{"Key":"u1","user":{"name":"ann","tags":["x","y"],"geo":{"city":"Oslo"}},"a.b":true}"#],
    );

    let r = LogReader::open(&path)?;
    assert_eq!(r.field("u1", "user.name")?.unwrap().as_str(), Some("ann"));
    assert_eq!(r.field("u1", "user.tags.1")?.unwrap().as_str(), Some("y"));
    assert_eq!(r.field("u1", "user.geo.city")?.unwrap().as_str(), Some("Oslo"));
    assert_eq!(r.field("u1", r"a\.b")?.unwrap().as_bool(), Some(true));
    assert_eq!(
        r.field("u1", "user.geo")?.unwrap().into_value(),
        Some(json!({"city": "Oslo"}))
    );

    let missing = r.field("u1", "user.email")?.unwrap();
    assert!(!missing.exists());
    assert!(!r.field("u1", "user.tags.7")?.unwrap().exists());
    assert!(!r.field("u1", "user.name.first")?.unwrap().exists());
    Ok(())
}

#[test]
fn field_lookup_rejects_bad_path() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let r = LogReader::open(&path)?;
    assert!(matches!(
        r.field("a", "v..x"),
        Err(StoreError::InvalidFieldPath(_))
    ));
    assert!(matches!(r.field("a", ""), Err(StoreError::InvalidFieldPath(_))));
    Ok(())
}

// -------------------- Snapshot semantics --------------------

#[test]
fn appends_after_scan_need_reindex() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let mut r = LogReader::open(&path)?;
    assert!(!r.contains_key("c"));

    {
        let mut f = OpenOptions::new().append(true).open(&path)?;
        f.write_all(b"{\"Key\":\"c\",\"v\":3}\n{\"Key\":\"a\",\"v\":10}\n")?;
    }
    // Still the old snapshot.
    assert!(r.get::<Row>("c")?.is_none());
    assert_eq!(r.get::<Row>("a")?.unwrap().v, 1);

    r.reindex()?;
    assert_eq!(r.len(), 3);
    assert_eq!(r.get::<Row>("c")?.unwrap().v, 3);
    assert_eq!(r.get::<Row>("a")?.unwrap().v, 10);
    Ok(())
}

#[test]
fn truncated_file_after_scan_is_io_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let r = LogReader::open(&path)?;
    OpenOptions::new().write(true).open(&path)?.set_len(20)?;

    assert!(matches!(r.get_raw("b"), Err(StoreError::Io(_))));
    // Entries before the cut are still readable.
    assert_eq!(r.get::<Row>("a")?.unwrap().v, 1);
    Ok(())
}

#[test]
fn concurrent_lookups_share_one_reader() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    {
        let mut w = LogWriter::create(&path)?;
        for i in 0..100 {
            w.append_record(&json!({"Key": format!("k{}", i), "v": i}))?;
        }
        w.close()?;
    }

    let r = LogReader::open(&path)?;
    std::thread::scope(|s| {
        for t in 0..4 {
            let r = &r;
            s.spawn(move || {
                for i in (t..100).step_by(4) {
                    let row: Row = r.get(&format!("k{}", i)).unwrap().unwrap();
                    assert_eq!(row.v, i as i64);
                }
            });
        }
    });
    Ok(())
}

// -------------------- Index export --------------------

#[test]
fn save_index_writes_delimited_export() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_lines(
        &path,
        &["# c", r#"{"Key":"a","v":1}"#, r#"{"Key":"b,c","v":2}"#],
    );
    let r = LogReader::open(&path)?;

    let idx_path = dir.path().join("store.idx");
    r.save_index(&idx_path)?;

    let text = fs::read_to_string(&idx_path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![INDEX_EXPORT_HEADER, "\"a\",4,18", "\"b,c\",22,20"]);
    assert!(!dir.path().join("store.idx.tmp").exists());

    // Export does not disturb the live index.
    assert_eq!(r.get::<Row>("b,c")?.unwrap().v, 2);
    Ok(())
}

#[test]
fn save_index_to_bad_path_is_io_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("store.log");
    write_ab(&path)?;

    let r = LogReader::open(&path)?;
    let res = r.save_index(dir.path().join("missing/dir/store.idx"));
    assert!(matches!(res, Err(StoreError::Io(_))));
    Ok(())
}
