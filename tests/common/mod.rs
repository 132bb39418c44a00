#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use profit_finder::{data::Value, frame::Table};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory that is removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }
}

/// Builds a raw upload from text cells; empty strings stay as text so the
/// null-token pass sees them.
pub fn text_table(headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_rows(
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|cell| Some(Value::Text(cell.to_string())))
                    .collect()
            })
            .collect(),
    )
}

pub fn numbers(table: &Table, column: &str) -> Vec<Option<f64>> {
    table
        .column(column)
        .unwrap_or_else(|| panic!("column {column} missing"))
        .numbers()
        .collect()
}
