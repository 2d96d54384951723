use crate::error::{ErrorKind, IngestError};

/// Retry behavior for a classified error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// The failed batch is written again after a backoff delay.
    Timed,
    /// The file fails immediately.
    NoRetry,
}

/// Policy describing how an [`IngestError`] is handled by file workers.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RetryPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl RetryPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    /// Returns the retry directive for this policy.
    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns `true` when the error should be retried.
    pub fn is_retryable(&self) -> bool {
        self.retry_directive == RetryDirective::Timed
    }

    /// Returns an optional operator-facing solution message.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Builds a [`RetryPolicy`] from an [`IngestError`] so every worker classifies failures the same
/// way.
pub fn build_retry_policy(error: &IngestError) -> RetryPolicy {
    match error.kind() {
        // Transient sink failures. A batch is atomic at the sink boundary, so writing it again
        // cannot duplicate records.
        ErrorKind::SinkError | ErrorKind::SinkTimeout => RetryPolicy::new(RetryDirective::Timed, None),

        ErrorKind::SourceIoError => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("Check that the input file exists and is readable, then ingest it again."),
        ),
        ErrorKind::ParseError => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("Fix the malformed row reported in the error detail, then ingest the remaining rows."),
        ),
        ErrorKind::SerializationError => RetryPolicy::new(
            RetryDirective::NoRetry,
            Some("The sink could not encode a record. Inspect the row range reported as lost."),
        ),

        _ => RetryPolicy::new(RetryDirective::NoRetry, None),
    }
}
