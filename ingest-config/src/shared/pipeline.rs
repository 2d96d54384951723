use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::{BatchConfig, RetryConfig, SourceConfig, ValidationError};

/// Configuration for an ingestion pipeline.
///
/// Contains every setting required to run a job: how records are batched, how many files are
/// processed at the same time, and how failed batch writes are retried.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Batch assembly configuration.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Maximum number of file workers that can run at a time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u16,
    /// Retry policy for failed batch writes.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Optional upper bound, in milliseconds, for a single batch write attempt.
    ///
    /// An attempt that does not complete within this time counts as a failed write.
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,
    /// Input decoding configuration.
    #[serde(default)]
    pub source: SourceConfig,
}

impl PipelineConfig {
    /// Default maximum number of concurrent file workers.
    pub const DEFAULT_MAX_CONCURRENCY: u16 = 5;

    /// Validates pipeline configuration settings.
    ///
    /// Checks nested sections and ensures the worker count and write timeout are non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.batch.validate()?;
        self.retry.validate()?;
        self.source.validate()?;

        if self.max_concurrency == 0 {
            return Err(ValidationError::MaxConcurrencyZero);
        }

        if self.write_timeout_ms == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "write_timeout_ms".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the per-attempt write timeout, if any.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            max_concurrency: default_max_concurrency(),
            retry: RetryConfig::default(),
            write_timeout_ms: None,
            source: SourceConfig::default(),
        }
    }
}

fn default_max_concurrency() -> u16 {
    PipelineConfig::DEFAULT_MAX_CONCURRENCY
}
