use ingest_config::shared::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff between write attempts of one batch.
///
/// The base delay starts at `initial_delay_ms`, doubles after every retry and is capped at
/// `max_delay_ms`. Each delay is shortened by a random amount of up to `jitter_percent` of its
/// base, but never below the previously returned delay, so the sequence is non-decreasing.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    next_base_ms: u64,
    max_delay_ms: u64,
    jitter_percent: u8,
    previous_ms: u64,
}

impl RetryBackoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next_base_ms: config.initial_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter_percent: config.jitter_percent,
            previous_ms: 0,
        }
    }

    /// Returns the delay to wait before the next retry and advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.next_base_ms.min(self.max_delay_ms);
        let jitter_range = base_ms as f64 * f64::from(self.jitter_percent) / 100.0;

        let jitter = if jitter_range > 0.0 {
            rand::rng().random_range(0.0..=jitter_range)
        } else {
            0.0
        };

        let jittered_ms = (base_ms as f64 - jitter).round() as u64;
        let delay_ms = jittered_ms.max(self.previous_ms);

        self.previous_ms = delay_ms;
        self.next_base_ms = base_ms.saturating_mul(2);

        Duration::from_millis(delay_ms)
    }
}
