//! Error type shared by every ingestion component.
//!
//! An [`IngestError`] is classified by an [`ErrorKind`], which decides how file workers react to
//! it, and carries the call site and a backtrace captured where it was created.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result alias used across the crate.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error raised while ingesting files.
///
/// Cloning is cheap; the source error and the backtrace are shared between clones so failures
/// can be kept in job reports and logged at the same time.
#[derive(Debug, Clone)]
pub struct IngestError {
    inner: Box<Inner>,
}

#[derive(Debug, Clone)]
struct Inner {
    kind: ErrorKind,
    description: &'static str,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Classification of an [`IngestError`].
///
/// The retry behaviour of each kind is defined by
/// [`crate::workers::policy::build_retry_policy`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input file could not be opened or read.
    SourceIoError,
    /// A row does not match the header or is not valid CSV.
    ParseError,
    /// The sink rejected a batch.
    SinkError,
    /// A batch write did not complete within the write timeout.
    SinkTimeout,
    ConfigError,
    IoError,
    SerializationError,
    /// An operation was attempted in a state that does not allow it.
    InvalidState,
    FileWorkerPanic,
    Unknown,
}

impl IngestError {
    #[track_caller]
    fn new(
        kind: ErrorKind,
        description: &'static str,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            inner: Box::new(Inner {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        Self::new(kind, description, Some(Cow::Owned(err.to_string()))).with_source(err)
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn description(&self) -> &str {
        self.inner.description
    }

    /// Returns the dynamic part of the message, such as the file path and line of a parse error.
    pub fn detail(&self) -> Option<&str> {
        self.inner.detail.as_deref()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        Some(self.inner.backtrace.as_ref())
    }

    /// Returns where the error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.inner.location
    }

    /// Returns a one-line rendering without location or backtrace, as shown in job reports.
    pub fn summary(&self) -> String {
        match self.detail() {
            Some(detail) if !detail.trim().is_empty() => {
                format!("[{:?}] {}: {}", self.kind(), self.description(), detail)
            }
            _ => format!("[{:?}] {}", self.kind(), self.description()),
        }
    }

    /// Attaches the error that caused this one, exposed through [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.inner.source = Some(Arc::new(source));
        self
    }
}

/// Errors compare by kind only; detail and location are diagnostics.
impl PartialEq for IngestError {
    fn eq(&self, other: &IngestError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self.location();
        write!(
            f,
            "[{:?}] {} @ {}:{}",
            self.kind(),
            self.description(),
            location.file(),
            location.line()
        )?;

        if let Some(detail) = self.detail() {
            write!(f, "\n  Detail:")?;
            write_indented(f, detail)?;
        }

        let backtrace = self.inner.backtrace.to_string();
        if !backtrace.trim().is_empty() {
            write!(f, "\n  Backtrace:")?;
            write_indented(f, &backtrace)?;
        }

        Ok(())
    }
}

fn write_indented(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for line in text.lines() {
        write!(f, "\n    {}", line.trim_end())?;
    }

    Ok(())
}

impl error::Error for IngestError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for IngestError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> IngestError {
        IngestError::new(kind, description, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for IngestError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> IngestError {
        IngestError::new(kind, description, Some(detail.into()))
    }
}

impl From<std::io::Error> for IngestError {
    #[track_caller]
    fn from(err: std::io::Error) -> IngestError {
        IngestError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Read failures become [`ErrorKind::SourceIoError`], every decoding failure
/// [`ErrorKind::ParseError`].
impl From<csv_async::Error> for IngestError {
    #[track_caller]
    fn from(err: csv_async::Error) -> IngestError {
        match err.kind() {
            csv_async::ErrorKind::Io(_) => {
                IngestError::wrap(ErrorKind::SourceIoError, "Reading input file failed", err)
            }
            _ => IngestError::wrap(ErrorKind::ParseError, "Malformed record in input file", err),
        }
    }
}

impl From<serde_json::Error> for IngestError {
    #[track_caller]
    fn from(err: serde_json::Error) -> IngestError {
        IngestError::wrap(ErrorKind::SerializationError, "JSON serialization failed", err)
    }
}

impl From<tokio::task::JoinError> for IngestError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> IngestError {
        IngestError::wrap(
            ErrorKind::FileWorkerPanic,
            "File worker terminated abnormally",
            err,
        )
    }
}

impl From<ingest_config::shared::ValidationError> for IngestError {
    #[track_caller]
    fn from(err: ingest_config::shared::ValidationError) -> IngestError {
        IngestError::wrap(ErrorKind::ConfigError, "Invalid pipeline configuration", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, ingest_error};

    #[test]
    fn plain_error_has_no_detail() {
        let err = IngestError::from((ErrorKind::SinkError, "Sink rejected batch"));
        assert_eq!(err.kind(), ErrorKind::SinkError);
        assert_eq!(err.detail(), None);
        assert_eq!(err.summary(), "[SinkError] Sink rejected batch");
    }

    #[test]
    fn summary_includes_detail() {
        let err = ingest_error!(
            ErrorKind::ParseError,
            "Malformed record in input file",
            "line 3 has 2 fields, expected 3"
        );
        assert_eq!(err.detail(), Some("line 3 has 2 fields, expected 3"));
        assert_eq!(
            err.summary(),
            "[ParseError] Malformed record in input file: line 3 has 2 fields, expected 3"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err: IngestError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert_eq!(err.detail(), Some("missing.csv"));
        assert!(error::Error::source(&err).is_some());
    }

    #[test]
    fn clones_share_the_source() {
        let err = ingest_error!(
            ErrorKind::SinkError,
            "Append failed",
            source: std::io::Error::other("disk full")
        );
        let cloned = err.clone();

        assert_eq!(err, cloned);
        assert_eq!(
            error::Error::source(&cloned).map(|source| source.to_string()),
            Some("disk full".to_string())
        );
    }

    #[test]
    fn display_contains_location_and_detail() {
        let err = ingest_error!(ErrorKind::SinkTimeout, "Write timed out", "after 5ms");
        let rendered = format!("{err}");
        assert!(rendered.starts_with("[SinkTimeout] Write timed out @ "));
        assert!(rendered.contains("error.rs"));
        assert!(rendered.contains("Detail:\n    after 5ms"));
    }

    #[test]
    fn bail_returns_early() {
        fn fails() -> IngestResult<()> {
            bail!(ErrorKind::InvalidState, "Not allowed", "detail");
        }

        let err = fails().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.detail(), Some("detail"));
    }
}
