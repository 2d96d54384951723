use metrics::gauge;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

use crate::concurrency::limiter::LimiterPermit;
use crate::error::IngestError;
use crate::metrics::INGEST_RUNNING_WORKERS;
use crate::types::{FileFailure, FileOutcome, FileProgress, FileTask, FileTaskId};

/// A worker that reached a terminal outcome.
#[derive(Debug)]
pub struct FinishedWorker {
    pub file_id: FileTaskId,
    pub path: Arc<Path>,
    pub outcome: FileOutcome,
}

#[derive(Debug)]
struct ActiveWorker {
    file_id: FileTaskId,
    path: Arc<Path>,
    progress: FileProgress,
}

/// Pool owning the tasks of every running file worker.
///
/// Each worker holds its [`LimiterPermit`] for as long as it runs, the permit is released when
/// the worker future finishes. A worker that panics is reported as a failed file, never as a
/// failure of the pool, with the progress it had made before panicking.
#[derive(Debug, Default)]
pub struct FileWorkerPool {
    /// Files handled by the tasks still owned by the join set.
    active: HashMap<Id, ActiveWorker>,
    join_set: JoinSet<FileOutcome>,
}

impl FileWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` as the worker for `task`, keeping `permit` until it finishes.
    ///
    /// `progress` must be the handle the worker updates, it is used to report a panic.
    pub fn spawn<F>(
        &mut self,
        task: &FileTask,
        permit: LimiterPermit,
        progress: FileProgress,
        future: F,
    )
    where
        F: Future<Output = FileOutcome> + Send + 'static,
    {
        let abort_handle = self.join_set.spawn(async move {
            let outcome = future.await;

            drop(permit);

            outcome
        });

        self.active.insert(
            abort_handle.id(),
            ActiveWorker {
                file_id: task.id(),
                path: task.path().clone(),
                progress,
            },
        );

        debug!(file_id = task.id(), path = %task.path().display(), "spawned file worker");

        gauge!(INGEST_RUNNING_WORKERS).set(self.join_set.len() as f64);
    }

    /// Waits for the next worker to finish.
    ///
    /// Returns `None` once no worker is running.
    pub async fn join_next(&mut self) -> Option<FinishedWorker> {
        loop {
            let result = self.join_set.join_next_with_id().await?;

            gauge!(INGEST_RUNNING_WORKERS).set(self.join_set.len() as f64);

            let (id, outcome) = match result {
                Ok((id, outcome)) => (id, outcome),
                Err(join_err) => {
                    let id = join_err.id();
                    let is_cancelled = join_err.is_cancelled();

                    let Some(worker) = self.active.remove(&id) else {
                        error!(error = %join_err, "unknown file worker terminated abnormally");
                        continue;
                    };

                    let stats = worker.progress.stats();
                    error!(
                        file_id = worker.file_id,
                        path = %worker.path.display(),
                        cancelled = is_cancelled,
                        rows_written = stats.rows_written,
                        error = %join_err,
                        "file worker terminated abnormally"
                    );

                    let failure = FileFailure::new(IngestError::from(join_err), stats);

                    return Some(FinishedWorker {
                        file_id: worker.file_id,
                        path: worker.path,
                        outcome: FileOutcome::Failed(failure),
                    });
                }
            };

            let Some(worker) = self.active.remove(&id) else {
                error!("finished file worker is not tracked by the pool");
                continue;
            };

            return Some(FinishedWorker {
                file_id: worker.file_id,
                path: worker.path,
                outcome,
            });
        }
    }

    /// Returns the number of running workers.
    pub fn len(&self) -> usize {
        self.join_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.join_set.is_empty()
    }
}
