//! Metric names and labels recorded by the ingestion pipeline.
//!
//! Metrics are emitted through the `metrics` facade and are no-ops until a recorder is
//! installed, see `ingest_telemetry::metrics::init_metrics`.

/// Label for the sink name in metrics.
pub const SINK_LABEL: &str = "sink";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for records delivered to the sink.
pub const INGEST_ROWS_WRITTEN_TOTAL: &str = "ingest_rows_written_total";

/// Counter for batches delivered to the sink.
pub const INGEST_BATCHES_WRITTEN_TOTAL: &str = "ingest_batches_written_total";

/// Histogram of the duration of successful batch writes, in seconds.
pub const INGEST_BATCH_WRITE_DURATION_SECONDS: &str = "ingest_batch_write_duration_seconds";

/// Counter for failed batch write attempts that were retried.
pub const INGEST_WRITE_RETRIES_TOTAL: &str = "ingest_write_retries_total";

/// Counter for files that were fully ingested.
pub const INGEST_FILES_COMPLETED_TOTAL: &str = "ingest_files_completed_total";

/// Counter for files that failed, labelled by error kind.
pub const INGEST_FILES_FAILED_TOTAL: &str = "ingest_files_failed_total";

/// Gauge for the number of file workers currently running.
pub const INGEST_RUNNING_WORKERS: &str = "ingest_running_workers";
