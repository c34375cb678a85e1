//! Persistence round-trip and edge case tests.
//!
//! Tests atomic writes, JSON persistence, and directory handling.

use std::path::PathBuf;
use tempfile::TempDir;

use crate::counter::WindowRecord;
use crate::persistence::{ensure_dir, load_json, save_json, write_atomic};
use chrono::{TimeZone, Utc};

#[test]
fn test_save_and_load_json_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("record.json");

    let record = WindowRecord {
        window_start: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap(),
        count: 7,
    };

    save_json(&path, &record).unwrap();
    let loaded: WindowRecord = load_json(&path).unwrap();

    assert_eq!(loaded, record);
}

#[test]
fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("deeply").join("nested").join("x.json");

    save_json(&nested, &serde_json::json!({"key": "value"})).unwrap();
    assert!(nested.exists());
}

#[test]
fn test_load_nonexistent_file() {
    let path = PathBuf::from("/nonexistent/path/record.json");
    let result: Result<WindowRecord, _> = load_json(&path);
    assert!(result.is_err());
}

#[test]
fn test_write_atomic_replaces_and_leaves_no_temp() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.json");

    write_atomic(&path, b"first").unwrap();
    write_atomic(&path, b"second").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_ensure_dir_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("counters");

    ensure_dir(&dir).unwrap();
    ensure_dir(&dir).unwrap();
    assert!(dir.is_dir());
}
