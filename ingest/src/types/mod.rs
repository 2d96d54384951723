//! Core data types flowing through an ingestion job.

mod batch;
mod job;
mod record;
mod task;

pub use batch::Batch;
pub use job::{FileFailure, FileOutcome, FileProgress, FileReport, FileStats, JobResult};
pub use record::Record;
pub use task::{FileTask, FileTaskId, FileTaskState};
