use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::IngestResult;
use crate::sink::Sink;
use crate::types::{Batch, Record};

#[derive(Debug, Default)]
struct Inner {
    batches: HashMap<PathBuf, Vec<Batch>>,
    shutdown_calls: usize,
}

/// In-memory sink for testing and development purposes.
///
/// [`MemorySink`] keeps every written batch grouped by the file it was read from. All data is
/// lost when the process terminates. Clones share the same storage, so a clone handed to a
/// pipeline can be inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    /// Creates a new empty memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the batches written for `path`, in write order.
    pub async fn batches(&self, path: &Path) -> Vec<Batch> {
        let inner = self.inner.lock().await;
        inner.batches.get(path).cloned().unwrap_or_default()
    }

    /// Returns a copy of the records written for `path`, in write order.
    pub async fn records(&self, path: &Path) -> Vec<Record> {
        let inner = self.inner.lock().await;
        inner
            .batches
            .get(path)
            .map(|batches| {
                batches
                    .iter()
                    .flat_map(|batch| batch.records().iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of records written across all files.
    pub async fn total_records(&self) -> usize {
        let inner = self.inner.lock().await;
        inner
            .batches
            .values()
            .flat_map(|batches| batches.iter())
            .map(Batch::len)
            .sum()
    }

    /// Returns how many times [`Sink::shutdown`] was called.
    pub async fn shutdown_calls(&self) -> usize {
        self.inner.lock().await.shutdown_calls
    }

    /// Clears all stored batches.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.batches.clear();
    }
}

impl Sink for MemorySink {
    fn name() -> &'static str {
        "memory"
    }

    async fn shutdown(&self) -> IngestResult<()> {
        let mut inner = self.inner.lock().await;
        inner.shutdown_calls += 1;

        Ok(())
    }

    async fn write_batch(&self, batch: &Batch) -> IngestResult<()> {
        let mut inner = self.inner.lock().await;

        debug!(
            path = %batch.source().display(),
            first_row = batch.first_row(),
            batch_rows = batch.len(),
            "writing batch to memory sink"
        );

        inner
            .batches
            .entry(batch.source().to_path_buf())
            .or_default()
            .push(batch.clone());

        Ok(())
    }
}
