use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use csv_async::{AsyncReaderBuilder, StringRecordsIntoStream};
use futures::{Stream, ready};
use pin_project_lite::pin_project;
use tokio::fs::File;

use crate::error::{ErrorKind, IngestError, IngestResult};
use crate::ingest_error;
use crate::types::Record;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: u8 = b',';

/// A delimited file with a header row.
///
/// Every call to [`RowSource::open`] reopens the file, so a source can be read again from the
/// start by opening it again.
#[derive(Debug, Clone)]
pub struct RowSource {
    path: Arc<Path>,
    delimiter: u8,
}

impl RowSource {
    pub fn new(path: impl Into<Arc<Path>>) -> Self {
        Self {
            path: path.into(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Arc<Path> {
        &self.path
    }

    /// Opens the file and reads its header row.
    ///
    /// Fails with [`ErrorKind::SourceIoError`] when the file cannot be opened or read and with
    /// [`ErrorKind::ParseError`] when the header row cannot be decoded.
    pub async fn open(&self) -> IngestResult<RecordStream> {
        let file = File::open(&*self.path).await.map_err(|err| {
            ingest_error!(
                ErrorKind::SourceIoError,
                "Opening input file failed",
                format!("'{}': {err}", self.path.display()),
                source: err
            )
        })?;

        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .delimiter(self.delimiter)
            .create_reader(file);

        let headers = reader
            .headers()
            .await
            .map_err(|err| source_error(&self.path, err))?;
        let columns: Arc<[String]> = headers.iter().map(str::to_owned).collect();

        Ok(RecordStream {
            records: reader.into_records(),
            columns,
            path: self.path.clone(),
            finished: false,
        })
    }
}

pin_project! {
    /// Stream of the data rows of an opened [`RowSource`].
    ///
    /// Yields records in file order. The first error ends the stream. Dropping the stream closes
    /// the file.
    #[must_use = "streams do nothing unless polled"]
    pub struct RecordStream {
        #[pin]
        records: StringRecordsIntoStream<'static, File>,
        columns: Arc<[String]>,
        path: Arc<Path>,
        finished: bool,
    }
}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    /// Returns the header row shared by every record of this stream.
    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }
}

impl Stream for RecordStream {
    type Item = IngestResult<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        match ready!(this.records.poll_next(cx)) {
            Some(Ok(record)) => {
                let values = record.iter().map(str::to_owned).collect();
                Poll::Ready(Some(Ok(Record::new(this.columns.clone(), values))))
            }
            Some(Err(err)) => {
                *this.finished = true;
                Poll::Ready(Some(Err(source_error(this.path, err))))
            }
            None => {
                *this.finished = true;
                Poll::Ready(None)
            }
        }
    }
}

/// Converts a reader error into an [`IngestError`] carrying the file path and line number.
fn source_error(path: &Path, err: csv_async::Error) -> IngestError {
    let (kind, description) = match err.kind() {
        csv_async::ErrorKind::Io(_) => (ErrorKind::SourceIoError, "Reading input file failed"),
        _ => (ErrorKind::ParseError, "Malformed record in input file"),
    };

    let detail = match error_line(&err) {
        Some(line) => format!("'{}' line {line}: {err}", path.display()),
        None => format!("'{}': {err}", path.display()),
    };

    ingest_error!(kind, description, detail = detail, source: err)
}

fn error_line(err: &csv_async::Error) -> Option<u64> {
    match err.kind() {
        csv_async::ErrorKind::UnequalLengths { pos, .. } | csv_async::ErrorKind::Utf8 { pos, .. } => {
            pos.as_ref().map(|pos| pos.line())
        }
        _ => None,
    }
}
