use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{IngestError, IngestResult};
use crate::types::FileTaskId;

/// Counters for the data a file worker delivered to the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub rows_written: u64,
    pub batches_written: u64,
}

/// Progress of a running file worker, shared with whoever needs to report on it if the worker
/// dies.
#[derive(Debug, Clone, Default)]
pub struct FileProgress {
    rows_written: Arc<AtomicU64>,
    batches_written: Arc<AtomicU64>,
}

impl FileProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a batch of `rows` acknowledged by the sink.
    pub fn record_batch(&self, rows: u64) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            rows_written: self.rows_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
        }
    }
}

/// Terminal failure of one file.
///
/// `rows_written` is the resume boundary: every data row before it was delivered exactly once,
/// no row at or after it was delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub error: IngestError,
    pub rows_written: u64,
    pub batches_written: u64,
    /// Data rows of the batch whose write failed, when the failure concerned a batch.
    pub lost_rows: Option<Range<u64>>,
    /// Write attempts spent on the lost batch, zero when no write was attempted.
    pub attempts: u32,
}

impl FileFailure {
    /// Creates a failure for a file that stopped before any sink write was attempted for the
    /// batch in progress.
    pub fn new(error: IngestError, stats: FileStats) -> Self {
        Self {
            error,
            rows_written: stats.rows_written,
            batches_written: stats.batches_written,
            lost_rows: None,
            attempts: 0,
        }
    }

    /// Records the batch that was lost and how many attempts it consumed.
    pub fn with_lost_batch(mut self, rows: Range<u64>, attempts: u32) -> Self {
        self.lost_rows = Some(rows);
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error.summary())?;
        match &self.lost_rows {
            Some(rows) => write!(
                f,
                " (rows {}..{} lost after {} attempt{}, {} rows written)",
                rows.start,
                rows.end,
                self.attempts,
                if self.attempts == 1 { "" } else { "s" },
                self.rows_written
            ),
            None => write!(f, " ({} rows written)", self.rows_written),
        }
    }
}

impl Serialize for FileFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FileFailure", 6)?;
        state.serialize_field("kind", &format!("{:?}", self.error.kind()))?;
        state.serialize_field("error", &self.error.summary())?;
        state.serialize_field("rows_written", &self.rows_written)?;
        state.serialize_field("batches_written", &self.batches_written)?;
        state.serialize_field("lost_rows", &self.lost_rows)?;
        state.serialize_field("attempts", &self.attempts)?;
        state.end()
    }
}

/// Terminal result of processing one file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Completed(FileStats),
    Failed(FileFailure),
}

impl FileOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns the rows delivered to the sink, regardless of the outcome.
    pub fn rows_written(&self) -> u64 {
        match self {
            Self::Completed(stats) => stats.rows_written,
            Self::Failed(failure) => failure.rows_written,
        }
    }
}

/// Outcome of one file, as stored in a [`JobResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub id: FileTaskId,
    pub path: Arc<Path>,
    pub outcome: FileOutcome,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            FileOutcome::Completed(stats) => write!(
                f,
                "{}: Completed ({} rows, {} batches)",
                self.path.display(),
                stats.rows_written,
                stats.batches_written
            ),
            FileOutcome::Failed(failure) => {
                write!(f, "{}: Failed: {}", self.path.display(), failure)
            }
        }
    }
}

impl Serialize for FileReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("FileReport", 3)?;
        state.serialize_field("path", &self.path.display().to_string())?;
        match &self.outcome {
            FileOutcome::Completed(stats) => {
                state.serialize_field("status", "completed")?;
                state.serialize_field("stats", stats)?;
            }
            FileOutcome::Failed(failure) => {
                state.serialize_field("status", "failed")?;
                state.serialize_field("failure", failure)?;
            }
        }
        state.end()
    }
}

/// Aggregated result of an ingestion job.
///
/// Reports are kept in input order regardless of the order in which files finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobResult {
    reports: Vec<FileReport>,
    completed: usize,
    failed: usize,
}

impl JobResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the terminal outcome of a file.
    pub fn record(&mut self, id: FileTaskId, path: Arc<Path>, outcome: FileOutcome) {
        if outcome.is_completed() {
            self.completed += 1;
        } else {
            self.failed += 1;
        }

        let index = self.reports.partition_point(|report| report.id < id);
        self.reports.insert(index, FileReport { id, path, outcome });
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn reports(&self) -> &[FileReport] {
        &self.reports
    }

    /// Returns every failed file with its failure, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &FileFailure)> {
        self.reports
            .iter()
            .filter_map(|report| match &report.outcome {
                FileOutcome::Failed(failure) => Some((report.path.as_ref(), failure)),
                FileOutcome::Completed(_) => None,
            })
    }

    /// Returns the sum of rows written across all files.
    pub fn rows_written(&self) -> u64 {
        self.reports
            .iter()
            .map(|report| report.outcome.rows_written())
            .sum()
    }

    /// Returns `true` when every file completed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Renders the result as pretty-printed JSON.
    pub fn to_json(&self) -> IngestResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            writeln!(f, "{report}")?;
        }
        write!(
            f,
            "{} file{}: {} completed, {} failed, {} rows written",
            self.total(),
            if self.total() == 1 { "" } else { "s" },
            self.completed,
            self.failed,
            self.rows_written()
        )
    }
}

impl Serialize for JobResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("JobResult", 4)?;
        state.serialize_field("completed", &self.completed)?;
        state.serialize_field("failed", &self.failed)?;
        state.serialize_field("rows_written", &self.rows_written())?;
        state.serialize_field("files", &self.reports)?;
        state.end()
    }
}
