use ingest::error::IngestError;
use ingest_config::LoadConfigError;
use ingest_config::shared::ValidationError;
use ingest_telemetry::metrics::BuildError;
use ingest_telemetry::tracing::TracingError;
use std::net::SocketAddr;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Reasons the `ingest` binary could not run a job or report its result.
///
/// Files that fail during a job are not errors at this level, they are part of the job result
/// and only affect the exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}", .0.summary())]
    Ingest(#[from] IngestError),

    #[error("{0}")]
    LoadConfig(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("the {sink} sink requires --output")]
    MissingOutput { sink: &'static str },

    #[error("{0}")]
    Tracing(#[from] TracingError),

    #[error("cannot serve metrics on {addr}: {source}")]
    Metrics { addr: SocketAddr, source: BuildError },

    #[error("cannot start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CliError {
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Ingest(_) => "ingestion error",
            CliError::LoadConfig(_) | CliError::InvalidConfig(_) => "configuration error",
            CliError::MissingOutput { .. } => "usage error",
            CliError::Tracing(_) | CliError::Metrics { .. } => "telemetry error",
            CliError::Runtime(_) => "startup error",
        }
    }

    /// Suggests what to change before running the job again.
    fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::LoadConfig(LoadConfigError::Environment(_)) => {
                Some("set APP_ENVIRONMENT to `dev` or `prod`, or unset it")
            }
            CliError::LoadConfig(_) => {
                Some("check the files in the configuration directory passed with --config-dir")
            }
            CliError::InvalidConfig(_) => {
                Some("fix the configuration file or override the value on the command line")
            }
            CliError::MissingOutput { .. } => Some("pass --output <FILE> or use --sink memory"),
            CliError::Metrics { .. } => Some("choose a free address for --metrics-addr"),
            CliError::Ingest(_) | CliError::Tracing(_) | CliError::Runtime(_) => None,
        }
    }

    /// Renders the error for stderr. Ingestion errors include their backtrace when
    /// `RUST_BACKTRACE` is enabled.
    pub fn render_report(&self) -> String {
        let mut out = format!("ingest: {}: {self}\n", self.category());

        if let Some(hint) = self.hint() {
            out.push_str(&format!("hint: {hint}\n"));
        }

        if let CliError::Ingest(err) = self
            && backtraces_enabled()
            && let Some(backtrace) = err.backtrace()
        {
            out.push_str(&format!("backtrace:\n{backtrace}\n"));
        }

        out
    }
}

fn backtraces_enabled() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}
