use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::sink::Sink;
use crate::types::{Batch, Record};

#[derive(Debug)]
struct Inner {
    file: File,
    /// Length of the file after the last successful write.
    len: u64,
    /// Set while an append is running. Still set when the next write starts means the previous
    /// write future was dropped before it finished.
    appending: bool,
}

impl Inner {
    /// Removes whatever an abandoned append left past `len`.
    ///
    /// Bytes handed to the file before the write future was dropped may still land, so they are
    /// awaited first and then cut off. A write that was not acknowledged is never kept.
    async fn discard_abandoned_append(&mut self, path: &Path) -> std::io::Result<()> {
        if !self.appending {
            return Ok(());
        }

        if let Err(err) = self.file.flush().await {
            debug!(path = %path.display(), error = %err, "abandoned append failed");
        }
        self.file.set_len(self.len).await?;
        self.appending = false;

        warn!(
            path = %path.display(),
            len = self.len,
            "removed output of an abandoned batch write"
        );

        Ok(())
    }
}

/// One output line.
#[derive(Serialize)]
struct JsonLine<'a> {
    source: Cow<'a, str>,
    row: u64,
    record: &'a Record,
}

/// Sink appending every record as one JSON object per line to a file.
///
/// A batch is serialized into memory first and then appended with a single write. If the write
/// fails the file is truncated back to its previous length, so a failed batch leaves no partial
/// output behind. The same holds when the write future is dropped, for example on a write
/// timeout: the next call removes the unacknowledged bytes before appending.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: Arc<Path>,
    inner: Arc<Mutex<Inner>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl Into<Arc<Path>>) -> IngestResult<Self> {
        let path = path.into();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&*path)
            .await
            .map_err(|err| open_error(&path, err))?;
        let len = file
            .metadata()
            .await
            .map_err(|err| open_error(&path, err))?
            .len();

        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(Inner {
                file,
                len,
                appending: false,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(batch: &Batch) -> IngestResult<Vec<u8>> {
        let source = batch.source().to_string_lossy();
        let mut buf = Vec::with_capacity(batch.len() * 64);

        for (offset, record) in batch.records().iter().enumerate() {
            let line = JsonLine {
                source: Cow::Borrowed(source.as_ref()),
                row: batch.first_row() + offset as u64,
                record,
            };
            serde_json::to_writer(&mut buf, &line)?;
            buf.push(b'\n');
        }

        Ok(buf)
    }
}

impl Sink for JsonLinesSink {
    fn name() -> &'static str {
        "jsonl"
    }

    async fn shutdown(&self) -> IngestResult<()> {
        let mut inner = self.inner.lock().await;

        inner
            .discard_abandoned_append(&self.path)
            .await
            .map_err(|err| write_error(&self.path, err))?;
        inner.file.flush().await.map_err(|err| write_error(&self.path, err))?;
        inner
            .file
            .sync_all()
            .await
            .map_err(|err| write_error(&self.path, err))?;

        debug!(path = %self.path.display(), bytes = inner.len, "json lines sink flushed");

        Ok(())
    }

    async fn write_batch(&self, batch: &Batch) -> IngestResult<()> {
        let buf = Self::encode(batch)?;

        let mut inner = self.inner.lock().await;
        inner
            .discard_abandoned_append(&self.path)
            .await
            .map_err(|err| write_error(&self.path, err))?;

        let previous_len = inner.len;
        inner.appending = true;

        let result = async {
            inner.file.write_all(&buf).await?;
            inner.file.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                inner.len = previous_len + buf.len() as u64;
                inner.appending = false;
                Ok(())
            }
            Err(err) => {
                match inner.file.set_len(previous_len).await {
                    Ok(()) => inner.appending = false,
                    Err(truncate_err) => warn!(
                        path = %self.path.display(),
                        error = %truncate_err,
                        "could not remove partial batch from output file"
                    ),
                }

                Err(write_error(&self.path, err))
            }
        }
    }
}

fn open_error(path: &Path, err: std::io::Error) -> IngestError {
    ingest_error!(
        ErrorKind::SinkError,
        "Opening output file failed",
        format!("'{}': {err}", path.display()),
        source: err
    )
}

fn write_error(path: &Path, err: std::io::Error) -> IngestError {
    ingest_error!(
        ErrorKind::SinkError,
        "Writing batch to output file failed",
        format!("'{}': {err}", path.display()),
        source: err
    )
}
