use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crate::types::Record;

/// An ordered group of records submitted to a sink as one unit.
///
/// A batch remembers which file it was read from and the index of its first data row (0-based,
/// the header row is not counted), so failures can be reported as row ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    source: Arc<Path>,
    first_row: u64,
    records: Vec<Record>,
}

impl Batch {
    pub fn new(source: Arc<Path>, first_row: u64, records: Vec<Record>) -> Self {
        Self {
            source,
            first_row,
            records,
        }
    }

    /// Returns the path of the file the records were read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns the index of the first data row in this batch.
    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    /// Returns the half-open range of data rows covered by this batch.
    pub fn row_range(&self) -> Range<u64> {
        self.first_row..self.first_row + self.records.len() as u64
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
