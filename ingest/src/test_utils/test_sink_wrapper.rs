use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;
use crate::sink::Sink;
use crate::types::{Batch, Record};

/// Decides which write attempts of a [`TestSinkWrapper`] fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailurePlan {
    /// Every attempt is forwarded to the wrapped sink.
    #[default]
    Never,
    /// The first `n` attempts, counted across all files, fail with a sink error.
    FirstAttempts(u64),
    /// Attempts fail with a sink error once `n` batches have been written successfully.
    AfterBatches(u64),
    /// Every attempt fails with a sink error.
    Always,
    /// Every attempt fails with the given error kind.
    AlwaysWithKind(ErrorKind),
    /// Every attempt for a batch read from one of these files fails with a sink error.
    ForSources(Vec<PathBuf>),
}

struct Inner<S> {
    wrapped_sink: S,
    batches: HashMap<PathBuf, Vec<Batch>>,
    write_attempts: u64,
    successful_writes: u64,
    shutdown_calls: u64,
}

/// Test wrapper for [`Sink`] implementations that tracks every write.
///
/// [`TestSinkWrapper`] records the batches accepted by the wrapped sink, counts write attempts,
/// measures how many writes run at the same time and can inject failures according to a
/// [`FailurePlan`]. Clones share all recorded state.
#[derive(Clone)]
pub struct TestSinkWrapper<S> {
    inner: Arc<RwLock<Inner<S>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    failure_plan: Arc<FailurePlan>,
    write_delay: Option<Duration>,
}

impl<S> fmt::Debug for TestSinkWrapper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("TestSinkWrapper");
        if let Ok(inner) = self.inner.try_read() {
            debug
                .field("write_attempts", &inner.write_attempts)
                .field("successful_writes", &inner.successful_writes);
        }
        debug
            .field("peak_in_flight", &self.peak_in_flight.load(Ordering::SeqCst))
            .field("failure_plan", &self.failure_plan)
            .finish()
    }
}

impl<S> TestSinkWrapper<S> {
    /// Creates a wrapper forwarding every write to `sink`.
    pub fn wrap(sink: S) -> Self {
        let inner = Inner {
            wrapped_sink: sink,
            batches: HashMap::new(),
            write_attempts: 0,
            successful_writes: 0,
            shutdown_calls: 0,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            failure_plan: Arc::new(FailurePlan::Never),
            write_delay: None,
        }
    }

    /// Sets the failure plan. Must be called before the wrapper is cloned.
    pub fn with_failure_plan(mut self, failure_plan: FailurePlan) -> Self {
        self.failure_plan = Arc::new(failure_plan);
        self
    }

    /// Delays every write attempt by `delay` before it is forwarded.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Returns the batches accepted for `path`, in write order.
    pub async fn written_batches(&self, path: &Path) -> Vec<Batch> {
        self.inner
            .read()
            .await
            .batches
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the records accepted for `path`, in write order.
    pub async fn written_records(&self, path: &Path) -> Vec<Record> {
        self.written_batches(path)
            .await
            .into_iter()
            .flat_map(Batch::into_records)
            .collect()
    }

    /// Returns the number of write attempts, including failed and timed out ones.
    pub async fn write_attempts(&self) -> u64 {
        self.inner.read().await.write_attempts
    }

    pub async fn successful_writes(&self) -> u64 {
        self.inner.read().await.successful_writes
    }

    pub async fn shutdown_calls(&self) -> u64 {
        self.inner.read().await.shutdown_calls
    }

    /// Returns the highest number of writes that were in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, attempt: u64, successful_writes: u64, batch: &Batch) -> Option<ErrorKind> {
        match &*self.failure_plan {
            FailurePlan::Never => None,
            FailurePlan::FirstAttempts(n) => (attempt <= *n).then_some(ErrorKind::SinkError),
            FailurePlan::AfterBatches(n) => (successful_writes >= *n).then_some(ErrorKind::SinkError),
            FailurePlan::Always => Some(ErrorKind::SinkError),
            FailurePlan::AlwaysWithKind(kind) => Some(*kind),
            FailurePlan::ForSources(paths) => paths
                .iter()
                .any(|path| path == batch.source())
                .then_some(ErrorKind::SinkError),
        }
    }
}

/// Tracks one write in progress, also when the write future is dropped.
struct InFlightGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(current, Ordering::SeqCst);

        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S> Sink for TestSinkWrapper<S>
where
    S: Sink + Send + Sync + Clone,
{
    fn name() -> &'static str {
        "wrapper"
    }

    async fn write_batch(&self, batch: &Batch) -> IngestResult<()> {
        let _guard = InFlightGuard::enter(&self.in_flight, &self.peak_in_flight);

        let (sink, attempt, failure) = {
            let mut inner = self.inner.write().await;
            inner.write_attempts += 1;
            let failure = self.should_fail(inner.write_attempts, inner.successful_writes, batch);

            (inner.wrapped_sink.clone(), inner.write_attempts, failure)
        };

        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(kind) = failure {
            return Err(ingest_error!(
                kind,
                "Injected sink failure",
                format!(
                    "attempt {attempt} for rows {}..{} of '{}'",
                    batch.row_range().start,
                    batch.row_range().end,
                    batch.source().display()
                )
            ));
        }

        let result = sink.write_batch(batch).await;

        if result.is_ok() {
            let mut inner = self.inner.write().await;
            inner.successful_writes += 1;
            inner
                .batches
                .entry(batch.source().to_path_buf())
                .or_default()
                .push(batch.clone());
        }

        result
    }

    async fn shutdown(&self) -> IngestResult<()> {
        let sink = {
            let mut inner = self.inner.write().await;
            inner.shutdown_calls += 1;
            inner.wrapped_sink.clone()
        };

        sink.shutdown().await
    }
}
