//! Batched, concurrency-bounded ingestion of delimited files.
//!
//! A [`pipeline::Pipeline`] reads every input file with a [`source::RowSource`], groups records
//! into batches and writes them to a [`sink::Sink`], processing several files in parallel under
//! a fixed concurrency limit. The outcome of every file is collected in a
//! [`types::JobResult`].

pub mod concurrency;
pub mod error;
mod macros;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
