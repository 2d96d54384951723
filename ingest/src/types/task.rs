use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::types::{FileFailure, FileOutcome, FileStats};

/// Identifier of a [`FileTask`], equal to the position of its path in the job input.
pub type FileTaskId = usize;

/// Processing state of one input file.
///
/// Transitions are `Pending → Running → {Completed, Failed}`; terminal states are final.
#[derive(Debug, Clone, PartialEq)]
pub enum FileTaskState {
    /// Set when the task is created, before a worker permit has been acquired.
    Pending,
    /// Set by the coordinator once a permit is held and the worker has been launched.
    Running,
    /// Every record of the file has been written to the sink.
    Completed(FileStats),
    /// The file could not be fully ingested.
    Failed(FileFailure),
}

impl FileTaskState {
    /// Returns `true` for [`FileTaskState::Completed`] and [`FileTaskState::Failed`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for FileTaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_static_str())
    }
}

impl From<FileOutcome> for FileTaskState {
    fn from(outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::Completed(stats) => Self::Completed(stats),
            FileOutcome::Failed(failure) => Self::Failed(failure),
        }
    }
}

/// One input file and its processing state.
#[derive(Debug, Clone)]
pub struct FileTask {
    id: FileTaskId,
    path: Arc<Path>,
    state: FileTaskState,
}

impl FileTask {
    /// Creates a new task in [`FileTaskState::Pending`].
    pub fn new(id: FileTaskId, path: impl Into<Arc<Path>>) -> Self {
        Self {
            id,
            path: path.into(),
            state: FileTaskState::Pending,
        }
    }

    pub fn id(&self) -> FileTaskId {
        self.id
    }

    pub fn path(&self) -> &Arc<Path> {
        &self.path
    }

    pub fn state(&self) -> &FileTaskState {
        &self.state
    }

    /// Moves the task from pending to running.
    pub fn start(&mut self) -> IngestResult<()> {
        if self.state != FileTaskState::Pending {
            bail!(
                ErrorKind::InvalidState,
                "File task cannot be started",
                format!(
                    "task {} for '{}' is {}, expected pending",
                    self.id,
                    self.path.display(),
                    self.state
                )
            );
        }

        self.state = FileTaskState::Running;

        Ok(())
    }

    /// Moves the task from running to the terminal state matching `outcome`.
    pub fn finish(&mut self, outcome: FileOutcome) -> IngestResult<()> {
        if self.state != FileTaskState::Running {
            bail!(
                ErrorKind::InvalidState,
                "File task cannot be finished",
                format!(
                    "task {} for '{}' is {}, expected running",
                    self.id,
                    self.path.display(),
                    self.state
                )
            );
        }

        self.state = outcome.into();

        Ok(())
    }
}
