//! Logging and metrics initialisation shared by the ingestion binaries and tests.

pub mod metrics;
pub mod tracing;
