//! Sinks receiving the batches produced by file workers.

mod base;
pub mod json_lines;
pub mod memory;

pub use base::Sink;
