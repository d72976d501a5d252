//! Shared helpers for integration tests.

#![allow(dead_code)]

#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;

use std::path::{Path, PathBuf};

/// Header row of a fresh work list.
pub const HEADER: &str = "gdrive_link,caption,uploaded,video_id\n";

/// Writes `rows` under the standard header and returns the file path.
pub fn write_store(dir: &Path, rows: &[&str]) -> PathBuf {
    let path = dir.join("uploads.csv");
    let mut content = HEADER.to_string();
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content).expect("Failed to write store");
    path
}
