//! Lazy record sources backed by delimited files.

mod csv_file;

pub use csv_file::{RecordStream, RowSource};
