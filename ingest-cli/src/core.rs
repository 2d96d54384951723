use clap::ValueEnum;
use ingest::pipeline::Pipeline;
use ingest::sink::Sink;
use ingest::sink::json_lines::JsonLinesSink;
use ingest::sink::memory::MemorySink;
use ingest::types::JobResult;
use ingest_config::shared::PipelineConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{CliError, CliResult};

/// Sink that receives the ingested batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SinkKind {
    /// Keeps batches in memory and discards them at exit. Useful to validate input files.
    #[default]
    Memory,
    /// Appends every record as one JSON object per line to `--output`.
    Jsonl,
}

/// Runs one ingestion job over `paths` with the selected sink.
///
/// Individual file failures are part of the returned [`JobResult`]. An error is only returned
/// when the job could not run at all.
pub async fn run_job(
    config: PipelineConfig,
    paths: &[PathBuf],
    sink_kind: SinkKind,
    output: Option<&Path>,
) -> CliResult<JobResult> {
    log_config(&config, paths.len());

    // Static dispatch per sink, so every sink gets its own pipeline instance.
    match sink_kind {
        SinkKind::Memory => {
            if output.is_some() {
                warn!("--output is ignored by the memory sink");
            }
            start_job(config, paths, MemorySink::new()).await
        }
        SinkKind::Jsonl => {
            let Some(output) = output else {
                return Err(CliError::MissingOutput {
                    sink: JsonLinesSink::name(),
                });
            };
            let sink = JsonLinesSink::open(output.to_path_buf()).await?;
            start_job(config, paths, sink).await
        }
    }
}

async fn start_job<S>(config: PipelineConfig, paths: &[PathBuf], sink: S) -> CliResult<JobResult>
where
    S: Sink + Clone + Send + Sync + 'static,
{
    let pipeline = Pipeline::new(config, sink);
    let result = pipeline.run(paths).await?;

    Ok(result)
}

fn log_config(config: &PipelineConfig, files: usize) {
    info!(
        files,
        batch_max_size = config.batch.max_size,
        max_concurrency = config.max_concurrency,
        max_retries = config.retry.max_retries,
        initial_delay_ms = config.retry.initial_delay_ms,
        max_delay_ms = config.retry.max_delay_ms,
        write_timeout_ms = ?config.write_timeout_ms,
        delimiter = %config.source.delimiter,
        "pipeline config"
    );
}
