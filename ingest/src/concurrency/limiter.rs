use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::{ErrorKind, IngestResult};
use crate::ingest_error;

/// Bounds how many file workers may run at the same time.
///
/// Cloning the limiter shares the same set of permits. Waiters are served in FIFO order by the
/// underlying [`Semaphore`], so no acquirer is starved.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

/// Right to run one worker, returned to the limiter when dropped.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct LimiterPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `max_concurrency` permits. Zero is raised to one.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);

        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    /// Waits until a permit is available and takes it.
    pub async fn acquire(&self) -> IngestResult<LimiterPermit> {
        let permit = self.permits.clone().acquire_owned().await.map_err(|err| {
            ingest_error!(
                ErrorKind::InvalidState,
                "Could not acquire a worker permit",
                err.to_string()
            )
        })?;

        Ok(LimiterPermit { _permit: permit })
    }

    /// Takes a permit if one is available without waiting.
    pub fn try_acquire(&self) -> Option<LimiterPermit> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Some(LimiterPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Returns a permit to the limiter. Equivalent to dropping it.
    pub fn release(&self, permit: LimiterPermit) {
        drop(permit);
    }

    /// Returns the number of permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Returns the number of permits currently held.
    pub fn in_use(&self) -> usize {
        self.max_concurrency - self.available()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
