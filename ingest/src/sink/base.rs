use std::future::Future;

use crate::error::IngestResult;
use crate::types::Batch;

/// Trait for datastores that accept batches of records.
///
/// A [`Sink`] reports success or failure for a whole batch. Implementations must make a write
/// all-or-nothing: after an error none of the batch's records may be visible, because the file
/// worker retries the same batch and relies on a failed attempt having had no effect.
///
/// Several file workers write through clones of the same sink concurrently, so implementations
/// must handle concurrent calls safely. Batches of one file are always written one at a time and
/// in file order.
///
/// The trait also provides an optional [`Sink::shutdown`] method with a default no-op
/// implementation. It is called once after every file of a job reached a terminal state.
pub trait Sink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Flushes and releases resources held by the sink.
    ///
    /// The default implementation is a no-op.
    fn shutdown(&self) -> impl Future<Output = IngestResult<()>> + Send {
        async { Ok(()) }
    }

    /// Writes every record of `batch` to the datastore.
    ///
    /// Failures should be reported with [`crate::error::ErrorKind::SinkError`], which the file
    /// worker retries. Any other kind fails the file without retrying.
    ///
    /// The returned future may be dropped before it completes when a write timeout is
    /// configured. A dropped write counts as not written and will be retried, so it must not
    /// leave records behind in the datastore.
    fn write_batch(&self, batch: &Batch) -> impl Future<Output = IngestResult<()>> + Send;
}
