//! Concurrency primitives used by the ingestion pipeline.
//!
//! [`limiter`] bounds how many files are processed at once and [`stream`] turns a stream of
//! records into a stream of batches, pulling from the file only as fast as batches are consumed.

pub mod limiter;
pub mod stream;
