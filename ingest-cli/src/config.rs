use clap::Args;
use ingest_config::shared::PipelineConfig;
use ingest_config::{
    Environment, LoadConfigError, has_configuration_directory, load_config, load_config_from,
};
use std::path::PathBuf;
use tracing::debug;

use crate::error::CliResult;

/// Command line overrides for the pipeline configuration.
///
/// Every flag left unset keeps the value from the configuration files, or the default when no
/// configuration directory exists.
#[derive(Debug, Default, Args)]
pub struct PipelineArgs {
    /// Directory holding base and environment configuration files.
    ///
    /// Defaults to `./configuration` when that directory exists.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Maximum number of records per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum number of files processed at the same time
    #[arg(long)]
    pub max_concurrency: Option<u16>,

    /// Number of retries for a failed batch write
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long)]
    pub initial_delay_ms: Option<u64>,

    /// Upper bound for a single retry delay, in milliseconds
    #[arg(long)]
    pub max_delay_ms: Option<u64>,

    /// Timeout for a single batch write attempt, in milliseconds
    #[arg(long)]
    pub write_timeout_ms: Option<u64>,

    /// Field delimiter of the input files
    #[arg(long)]
    pub delimiter: Option<char>,
}

/// Loads the pipeline configuration, applies command line overrides and validates the result.
pub fn load_pipeline_config(args: &PipelineArgs) -> CliResult<PipelineConfig> {
    let mut config = match &args.config_dir {
        Some(dir) => {
            let environment = Environment::load().map_err(LoadConfigError::Environment)?;
            load_config_from::<PipelineConfig>(dir, environment)?
        }
        None if has_configuration_directory() => {
            load_config::<PipelineConfig>()?
        }
        None => {
            debug!("no configuration directory found, using defaults");
            PipelineConfig::default()
        }
    };

    apply_overrides(&mut config, args);
    config.validate()?;

    Ok(config)
}

fn apply_overrides(config: &mut PipelineConfig, args: &PipelineArgs) {
    if let Some(batch_size) = args.batch_size {
        config.batch.max_size = batch_size;
    }
    if let Some(max_concurrency) = args.max_concurrency {
        config.max_concurrency = max_concurrency;
    }
    if let Some(max_retries) = args.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(initial_delay_ms) = args.initial_delay_ms {
        config.retry.initial_delay_ms = initial_delay_ms;
    }
    if let Some(max_delay_ms) = args.max_delay_ms {
        config.retry.max_delay_ms = max_delay_ms;
    }
    if args.write_timeout_ms.is_some() {
        config.write_timeout_ms = args.write_timeout_ms;
    }
    if let Some(delimiter) = args.delimiter {
        config.source.delimiter = delimiter;
    }
}
