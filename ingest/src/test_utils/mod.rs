//! Utilities for testing ingestion jobs.
//!
//! - [`test_sink_wrapper`] wraps any sink to record writes, track concurrency and inject
//!   failures.
//! - The functions below create CSV fixtures in temporary directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::types::Record;

pub mod test_sink_wrapper;

/// Creates a temporary directory for fixtures, removed when dropped.
pub fn fixture_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create fixture directory")
}

/// Writes a CSV file named `name` into `dir` and returns its path.
pub fn write_csv(dir: &Path, name: &str, headers: &[&str], rows: &[Vec<String>]) -> PathBuf {
    let mut contents = headers.join(",");
    contents.push('\n');

    for row in rows {
        contents.push_str(&row.join(","));
        contents.push('\n');
    }

    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write csv fixture");

    path
}

/// Returns `count` single-column rows holding `0..count`.
pub fn numbered_rows(count: usize) -> Vec<Vec<String>> {
    (0..count).map(|n| vec![n.to_string()]).collect()
}

/// Writes a file with an `id` and a `value` column and `count` rows.
///
/// Row `n` holds `n` and `value-n`, so delivered records can be checked against their position.
pub fn write_numbered_csv(dir: &Path, name: &str, count: usize) -> PathBuf {
    let rows: Vec<Vec<String>> = (0..count)
        .map(|n| vec![n.to_string(), format!("value-{n}")])
        .collect();

    write_csv(dir, name, &["id", "value"], &rows)
}

/// Builds a record from column names and values.
pub fn record(columns: &[&str], values: &[&str]) -> Record {
    let columns: Arc<[String]> = columns.iter().map(|column| (*column).to_owned()).collect();
    let values = values.iter().map(|value| (*value).to_owned()).collect();

    Record::new(columns, values)
}

/// Returns the `id` column of each record, parsed as a number.
pub fn record_ids(records: &[Record]) -> Vec<u64> {
    records
        .iter()
        .map(|record| {
            record
                .get("id")
                .and_then(|id| id.parse().ok())
                .expect("record without a numeric id column")
        })
        .collect()
}
