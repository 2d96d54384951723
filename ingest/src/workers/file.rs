use futures::StreamExt;
use ingest_config::shared::PipelineConfig;
use metrics::{counter, histogram};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, warn};

use crate::concurrency::stream::BatchStream;
use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::metrics::{
    ERROR_KIND_LABEL, INGEST_BATCH_WRITE_DURATION_SECONDS, INGEST_BATCHES_WRITTEN_TOTAL,
    INGEST_FILES_COMPLETED_TOTAL, INGEST_FILES_FAILED_TOTAL, INGEST_ROWS_WRITTEN_TOTAL,
    INGEST_WRITE_RETRIES_TOTAL, SINK_LABEL,
};
use crate::sink::Sink;
use crate::source::RowSource;
use crate::types::{
    Batch, FileFailure, FileOutcome, FileProgress, FileStats, FileTask, FileTaskId,
};
use crate::workers::backoff::RetryBackoff;
use crate::workers::policy::build_retry_policy;

/// A batch write that could not be completed.
struct LostBatch {
    error: IngestError,
    attempts: u32,
}

/// Worker ingesting a single file.
///
/// The worker reads the file through a [`RowSource`], groups its records with a [`BatchStream`]
/// and writes every batch to the sink one at a time, in file order. A batch is only read after
/// the previous one was written, so at most one batch per file is held in memory.
///
/// Failed writes are retried according to the pipeline's retry configuration. When a batch
/// cannot be written the rest of the file is skipped and the failure reports the rows that
/// were delivered before it.
#[derive(Debug)]
pub struct FileWorker<S> {
    file_id: FileTaskId,
    path: Arc<Path>,
    config: Arc<PipelineConfig>,
    sink: S,
    progress: FileProgress,
}

impl<S> FileWorker<S>
where
    S: Sink + Send + Sync + 'static,
{
    pub fn new(task: &FileTask, config: Arc<PipelineConfig>, sink: S) -> Self {
        Self {
            file_id: task.id(),
            path: task.path().clone(),
            config,
            sink,
            progress: FileProgress::new(),
        }
    }

    /// Returns a handle on the rows and batches written so far, which stays readable after
    /// the worker panicked.
    pub fn progress(&self) -> FileProgress {
        self.progress.clone()
    }

    /// Ingests the file and returns its terminal outcome.
    ///
    /// Every failure, including failures to open the file, is reported as
    /// [`FileOutcome::Failed`].
    pub async fn process(self) -> FileOutcome {
        let file_worker_span = tracing::info_span!(
            "file_worker",
            file_id = self.file_id,
            path = %self.path.display(),
        );

        self.guarded_process().instrument(file_worker_span).await
    }

    async fn guarded_process(self) -> FileOutcome {
        info!(sink = S::name(), "starting file ingestion");

        let mut stats = FileStats::default();
        let started = Instant::now();

        match self.copy_file(&mut stats).await {
            Ok(()) => {
                info!(
                    rows_written = stats.rows_written,
                    batches_written = stats.batches_written,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "file ingestion completed"
                );

                counter!(INGEST_FILES_COMPLETED_TOTAL, SINK_LABEL => S::name()).increment(1);

                FileOutcome::Completed(stats)
            }
            Err(failure) => {
                let policy = build_retry_policy(&failure.error);
                error!(
                    rows_written = failure.rows_written,
                    attempts = failure.attempts,
                    lost_rows = ?failure.lost_rows,
                    solution = policy.solution(),
                    error = %failure.error,
                    "file ingestion failed"
                );

                counter!(
                    INGEST_FILES_FAILED_TOTAL,
                    SINK_LABEL => S::name(),
                    ERROR_KIND_LABEL => format!("{:?}", failure.error.kind()),
                )
                .increment(1);

                FileOutcome::Failed(failure)
            }
        }
    }

    /// Streams the file into the sink, updating `stats` after every written batch.
    async fn copy_file(&self, stats: &mut FileStats) -> Result<(), FileFailure> {
        let source =
            RowSource::new(self.path.clone()).with_delimiter(self.config.source.delimiter_byte());
        let records = source
            .open()
            .await
            .map_err(|err| FileFailure::new(err, *stats))?;

        let batches = BatchStream::wrap(records, self.path.clone(), self.config.batch.max_size);
        let mut batches = std::pin::pin!(batches);

        while let Some(batch) = batches.next().await {
            let batch = batch.map_err(|err| FileFailure::new(err, *stats))?;

            if let Err(lost) = self.write_with_retries(&batch).await {
                return Err(FileFailure::new(lost.error, *stats)
                    .with_lost_batch(batch.row_range(), lost.attempts));
            }

            stats.rows_written += batch.len() as u64;
            stats.batches_written += 1;
            self.progress.record_batch(batch.len() as u64);
        }

        Ok(())
    }

    /// Writes `batch`, retrying retryable failures until the attempts are exhausted.
    async fn write_with_retries(&self, batch: &Batch) -> Result<(), LostBatch> {
        let max_attempts = self.config.retry.max_retries.saturating_add(1);
        let mut backoff = RetryBackoff::new(&self.config.retry);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let before_sending = Instant::now();
            let error = match self.write_attempt(batch).await {
                Ok(()) => {
                    debug!(
                        first_row = batch.first_row(),
                        batch_rows = batch.len(),
                        attempt,
                        "batch written"
                    );

                    counter!(INGEST_ROWS_WRITTEN_TOTAL, SINK_LABEL => S::name())
                        .increment(batch.len() as u64);
                    counter!(INGEST_BATCHES_WRITTEN_TOTAL, SINK_LABEL => S::name()).increment(1);
                    histogram!(INGEST_BATCH_WRITE_DURATION_SECONDS, SINK_LABEL => S::name())
                        .record(before_sending.elapsed().as_secs_f64());

                    return Ok(());
                }
                Err(error) => error,
            };

            if !build_retry_policy(&error).is_retryable() {
                warn!(
                    first_row = batch.first_row(),
                    batch_rows = batch.len(),
                    attempt,
                    error = %error.summary(),
                    "batch write failed with a non retryable error"
                );

                return Err(LostBatch {
                    error,
                    attempts: attempt,
                });
            }

            if attempt >= max_attempts {
                warn!(
                    first_row = batch.first_row(),
                    batch_rows = batch.len(),
                    attempt,
                    error = %error.summary(),
                    "batch write failed, no retries left"
                );

                return Err(LostBatch {
                    error,
                    attempts: attempt,
                });
            }

            let delay = backoff.next_delay();
            warn!(
                first_row = batch.first_row(),
                batch_rows = batch.len(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error.summary(),
                "batch write failed, retrying"
            );

            counter!(
                INGEST_WRITE_RETRIES_TOTAL,
                SINK_LABEL => S::name(),
                ERROR_KIND_LABEL => format!("{:?}", error.kind()),
            )
            .increment(1);

            tokio::time::sleep(delay).await;
        }
    }

    /// Performs one write attempt, bounded by the configured write timeout.
    async fn write_attempt(&self, batch: &Batch) -> IngestResult<()> {
        let Some(timeout) = self.config.write_timeout() else {
            return self.sink.write_batch(batch).await;
        };

        match tokio::time::timeout(timeout, self.sink.write_batch(batch)).await {
            Ok(result) => result,
            Err(_) => Err(ingest_error!(
                ErrorKind::SinkTimeout,
                "Batch write timed out",
                format!(
                    "rows {}..{} not acknowledged by sink '{}' within {}ms",
                    batch.row_range().start,
                    batch.row_range().end,
                    S::name(),
                    timeout.as_millis()
                )
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory::MemorySink;
    use crate::test_utils::test_sink_wrapper::{FailurePlan, TestSinkWrapper};
    use crate::test_utils::{numbered_rows, write_csv};
    use ingest_config::shared::RetryConfig;
    use std::time::Duration;

    fn config(max_batch_size: usize, max_retries: u32) -> Arc<PipelineConfig> {
        let mut config = PipelineConfig::default();
        config.batch.max_size = max_batch_size;
        config.retry = RetryConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 4,
            jitter_percent: 0,
        };
        Arc::new(config)
    }

    fn task(path: &Path) -> FileTask {
        FileTask::new(0, path.to_path_buf())
    }

    #[tokio::test]
    async fn writes_every_batch_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rows.csv", &["n"], &numbered_rows(25));
        let sink = MemorySink::new();

        let outcome = FileWorker::new(&task(&path), config(10, 0), sink.clone())
            .process()
            .await;

        assert_eq!(
            outcome,
            FileOutcome::Completed(FileStats {
                rows_written: 25,
                batches_written: 3,
            })
        );
        let ranges: Vec<_> = sink
            .batches(&path)
            .await
            .iter()
            .map(Batch::row_range)
            .collect();
        assert_eq!(ranges, vec![0..10, 10..20, 20..25]);
    }

    #[tokio::test]
    async fn progress_follows_written_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rows.csv", &["n"], &numbered_rows(30));
        let sink = TestSinkWrapper::wrap(MemorySink::new())
            .with_failure_plan(FailurePlan::AfterBatches(2));

        let worker = FileWorker::new(&task(&path), config(10, 0), sink);
        let progress = worker.progress();
        let outcome = worker.process().await;

        assert!(!outcome.is_completed());
        assert_eq!(
            progress.stats(),
            FileStats {
                rows_written: 20,
                batches_written: 2,
            }
        );
    }

    #[tokio::test]
    async fn retries_a_batch_until_the_sink_accepts_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rows.csv", &["n"], &numbered_rows(5));
        let sink = TestSinkWrapper::wrap(MemorySink::new())
            .with_failure_plan(FailurePlan::FirstAttempts(2));

        let outcome = FileWorker::new(&task(&path), config(5, 3), sink.clone())
            .process()
            .await;

        assert!(outcome.is_completed());
        assert_eq!(sink.write_attempts().await, 3);
        assert_eq!(sink.written_records(&path).await.len(), 5);
    }

    #[tokio::test]
    async fn fails_the_file_when_retries_are_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rows.csv", &["n"], &numbered_rows(30));
        let sink = TestSinkWrapper::wrap(MemorySink::new())
            .with_failure_plan(FailurePlan::AfterBatches(1));

        let outcome = FileWorker::new(&task(&path), config(10, 2), sink.clone())
            .process()
            .await;

        let FileOutcome::Failed(failure) = outcome else {
            panic!("expected a failed outcome");
        };
        assert_eq!(failure.error.kind(), ErrorKind::SinkError);
        assert_eq!(failure.rows_written, 10);
        assert_eq!(failure.batches_written, 1);
        assert_eq!(failure.lost_rows, Some(10..20));
        assert_eq!(failure.attempts, 3);
        assert_eq!(sink.write_attempts().await, 4);
        assert_eq!(sink.written_records(&path).await.len(), 10);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_sink_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rows.csv", &["n"], &numbered_rows(3));
        let sink = TestSinkWrapper::wrap(MemorySink::new())
            .with_failure_plan(FailurePlan::AlwaysWithKind(ErrorKind::SerializationError));

        let outcome = FileWorker::new(&task(&path), config(10, 5), sink.clone())
            .process()
            .await;

        let FileOutcome::Failed(failure) = outcome else {
            panic!("expected a failed outcome");
        };
        assert_eq!(failure.error.kind(), ErrorKind::SerializationError);
        assert_eq!(failure.attempts, 1);
        assert_eq!(sink.write_attempts().await, 1);
    }

    #[tokio::test]
    async fn parse_error_fails_without_writing_the_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(&path, "a,b\n1,2\n3,4\n5,6\n7\n8,9\n").unwrap();
        let sink = TestSinkWrapper::wrap(MemorySink::new());

        let outcome = FileWorker::new(&task(&path), config(2, 3), sink.clone())
            .process()
            .await;

        let FileOutcome::Failed(failure) = outcome else {
            panic!("expected a failed outcome");
        };
        assert_eq!(failure.error.kind(), ErrorKind::ParseError);
        assert_eq!(failure.rows_written, 2);
        assert_eq!(failure.lost_rows, None);
        assert_eq!(failure.attempts, 0);
        assert_eq!(sink.write_attempts().await, 1);
    }

    #[tokio::test]
    async fn missing_file_fails_with_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.csv");

        let outcome = FileWorker::new(&task(&path), config(10, 3), MemorySink::new())
            .process()
            .await;

        let FileOutcome::Failed(failure) = outcome else {
            panic!("expected a failed outcome");
        };
        assert_eq!(failure.error.kind(), ErrorKind::SourceIoError);
        assert_eq!(failure.rows_written, 0);
    }

    #[tokio::test]
    async fn empty_file_completes_without_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "empty.csv", &["n"], &[]);
        let sink = TestSinkWrapper::wrap(MemorySink::new());

        let outcome = FileWorker::new(&task(&path), config(10, 3), sink.clone())
            .process()
            .await;

        assert_eq!(outcome, FileOutcome::Completed(FileStats::default()));
        assert_eq!(sink.write_attempts().await, 0);
    }

    #[tokio::test]
    async fn slow_writes_time_out_and_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rows.csv", &["n"], &numbered_rows(4));
        let sink = TestSinkWrapper::wrap(MemorySink::new())
            .with_write_delay(Duration::from_millis(200));

        let mut config = (*config(10, 1)).clone();
        config.write_timeout_ms = Some(10);

        let outcome = FileWorker::new(&task(&path), Arc::new(config), sink.clone())
            .process()
            .await;

        let FileOutcome::Failed(failure) = outcome else {
            panic!("expected a failed outcome");
        };
        assert_eq!(failure.error.kind(), ErrorKind::SinkTimeout);
        assert_eq!(failure.attempts, 2);
        assert!(sink.written_records(&path).await.is_empty());
    }
}
