//! Retry configuration for batch writes.

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of the retry policy applied when a batch write fails.
///
/// A failed batch is retried up to [`RetryConfig::max_retries`] times. The delay before the
/// n-th retry is `initial_delay_ms * 2^(n - 1)`, capped at `max_delay_ms` and jittered downwards
/// by up to `jitter_percent` percent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Number of additional attempts after the first failed write of a batch.
    ///
    /// Default: 3
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay in milliseconds before the first retry.
    ///
    /// Default: 100
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound in milliseconds for a single backoff delay.
    ///
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter percentage subtracted at random from each backoff delay (0-50).
    ///
    /// Helps prevent many workers from hammering a recovering sink at the same instant.
    /// Default: 25
    #[serde(default = "default_jitter_percent")]
    pub jitter_percent: u8,
}

impl RetryConfig {
    /// Default number of retries per batch.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Default initial backoff: 100 milliseconds.
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

    /// Default maximum backoff: 10 seconds.
    pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

    /// Default jitter percentage: 25%.
    pub const DEFAULT_JITTER_PERCENT: u8 = 25;

    /// Highest accepted jitter percentage.
    pub const MAX_JITTER_PERCENT: u8 = 50;

    /// Validates the retry configuration.
    ///
    /// Ensures jitter_percent is <= 50 and initial_delay_ms <= max_delay_ms.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jitter_percent > Self::MAX_JITTER_PERCENT {
            return Err(ValidationError::InvalidFieldValue {
                field: "retry.jitter_percent".to_string(),
                constraint: format!("must be <= {}", Self::MAX_JITTER_PERCENT),
            });
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ValidationError::InvalidFieldValue {
                field: "retry.initial_delay_ms".to_string(),
                constraint: "must be <= retry.max_delay_ms".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            initial_delay_ms: Self::DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: Self::DEFAULT_MAX_DELAY_MS,
            jitter_percent: Self::DEFAULT_JITTER_PERCENT,
        }
    }
}

fn default_max_retries() -> u32 {
    RetryConfig::DEFAULT_MAX_RETRIES
}

fn default_initial_delay_ms() -> u64 {
    RetryConfig::DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    RetryConfig::DEFAULT_MAX_DELAY_MS
}

fn default_jitter_percent() -> u8 {
    RetryConfig::DEFAULT_JITTER_PERCENT
}
