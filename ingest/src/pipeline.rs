use ingest_config::shared::PipelineConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::concurrency::limiter::ConcurrencyLimiter;
use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::sink::Sink;
use crate::types::{FileTask, JobResult};
use crate::workers::file::FileWorker;
use crate::workers::pool::{FileWorkerPool, FinishedWorker};

/// Coordinator of an ingestion job.
///
/// A [`Pipeline`] ingests a list of files into a sink, running at most
/// [`PipelineConfig::max_concurrency`] file workers at a time. Files are started in input order
/// as permits become available. The job result is owned by the coordinator and only updated from
/// the task calling [`Pipeline::run`].
#[derive(Debug)]
pub struct Pipeline<S> {
    config: Arc<PipelineConfig>,
    sink: S,
}

impl<S> Pipeline<S>
where
    S: Sink + Clone + Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig, sink: S) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingests every file in `paths` and returns once all of them reached a terminal state.
    ///
    /// Fails with [`ErrorKind::ConfigError`] before any file is touched when the configuration is
    /// invalid. Failures of individual files never fail the job, they are reported in the
    /// returned [`JobResult`].
    pub async fn run<I>(&self, paths: I) -> IngestResult<JobResult>
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        self.config.validate()?;

        let mut tasks: Vec<FileTask> = paths
            .into_iter()
            .enumerate()
            .map(|(id, path)| FileTask::new(id, Arc::<Path>::from(path.as_ref())))
            .collect();
        let mut result = JobResult::new();

        info!(
            files = tasks.len(),
            max_concurrency = self.config.max_concurrency,
            max_batch_size = self.config.batch.max_size,
            max_retries = self.config.retry.max_retries,
            sink = S::name(),
            "starting ingestion job"
        );

        let limiter = ConcurrencyLimiter::new(self.config.max_concurrency as usize);
        let mut pool = FileWorkerPool::new();

        for index in 0..tasks.len() {
            // We keep recording finished workers while waiting for a permit, so outcomes do not
            // pile up in the pool until the last file has been started.
            let permit = loop {
                tokio::select! {
                    biased;

                    Some(finished) = pool.join_next(), if !pool.is_empty() => {
                        Self::record_outcome(&mut tasks, &mut result, finished)?;
                    }
                    permit = limiter.acquire() => {
                        break permit?;
                    }
                }
            };

            let task = &mut tasks[index];
            task.start()?;

            let worker = FileWorker::new(task, self.config.clone(), self.sink.clone());
            let progress = worker.progress();
            pool.spawn(task, permit, progress, worker.process());
        }

        while let Some(finished) = pool.join_next().await {
            Self::record_outcome(&mut tasks, &mut result, finished)?;
        }

        if let Err(err) = self.sink.shutdown().await {
            error!(sink = S::name(), error = %err, "sink shutdown failed");
        }

        info!(
            completed = result.completed(),
            failed = result.failed(),
            rows_written = result.rows_written(),
            "ingestion job finished"
        );

        Ok(result)
    }

    fn record_outcome(
        tasks: &mut [FileTask],
        result: &mut JobResult,
        finished: FinishedWorker,
    ) -> IngestResult<()> {
        let Some(task) = tasks.get_mut(finished.file_id) else {
            return Err(ingest_error!(
                ErrorKind::InvalidState,
                "Finished worker does not belong to this job",
                format!("file id {} for '{}'", finished.file_id, finished.path.display())
            ));
        };

        task.finish(finished.outcome.clone())?;

        debug!(
            file_id = finished.file_id,
            path = %finished.path.display(),
            state = %task.state(),
            "recorded file outcome"
        );

        result.record(finished.file_id, finished.path, finished.outcome);

        Ok(())
    }
}
