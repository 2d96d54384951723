//! Command line entry point for CSV ingestion jobs.
//!
//! Loads the pipeline configuration, initializes logging and optional metrics, then runs one job
//! over the given files and prints the per-file result.

use clap::{Args, Parser, ValueEnum};
use ingest::types::JobResult;
use ingest_telemetry::metrics::init_metrics;
use ingest_telemetry::tracing::{LogFormat, init_tracing};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use crate::config::{PipelineArgs, load_pipeline_config};
use crate::core::{SinkKind, run_job};
use crate::error::{CliError, CliResult};

mod config;
mod core;
mod error;

/// Exit code when one or more files failed.
const EXIT_FILES_FAILED: u8 = 1;

/// Exit code when the job could not run.
const EXIT_JOB_ERROR: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "ingest", version, about, arg_required_else_help = true)]
struct Cli {
    /// CSV files to ingest. Each file must start with a header row.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[clap(flatten)]
    pipeline: PipelineArgs,

    #[clap(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Sink receiving the batches
    #[arg(long, value_enum, default_value_t = SinkKind::Memory)]
    sink: SinkKind,

    /// Output file for the jsonl sink
    #[arg(long)]
    output: Option<PathBuf>,

    /// Format of the job report printed to stdout
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report_format: ReportFormat,

    /// Format of log lines
    #[arg(long, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,

    /// Address for the Prometheus metrics endpoint, disabled when unset
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(result) if result.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FILES_FAILED),
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::from(EXIT_JOB_ERROR)
        }
    }
}

fn run(cli: Cli) -> CliResult<JobResult> {
    init_tracing(env!("CARGO_BIN_NAME"), cli.output.log_format.into())?;

    let config = load_pipeline_config(&cli.pipeline)?;

    if let Some(addr) = cli.output.metrics_addr {
        init_metrics(addr, None).map_err(|source| CliError::Metrics { addr, source })?;
        info!(%addr, "metrics endpoint listening");
    }

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?
        .block_on(run_job(
            config,
            &cli.paths,
            cli.output.sink,
            cli.output.output.as_deref(),
        ))?;

    print_report(&result, cli.output.report_format)?;

    Ok(result)
}

fn print_report(result: &JobResult, format: ReportFormat) -> CliResult<()> {
    match format {
        ReportFormat::Text => println!("{result}"),
        ReportFormat::Json => println!("{}", result.to_json()?),
    }

    Ok(())
}
