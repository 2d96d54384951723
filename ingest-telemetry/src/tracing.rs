use std::sync::Once;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Filter applied in tests when `RUST_LOG` is not set.
const DEFAULT_TEST_LOG_FILTER: &str = "warn";

static INIT_TEST_TRACING: Once = Once::new();

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Initializes the global tracing subscriber for a binary.
///
/// Log filtering is read from `RUST_LOG` and defaults to `info` for every target. Lines go to
/// stderr, leaving stdout to the job report.
pub fn init_tracing(app_name: &str, format: LogFormat) -> Result<(), TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    ::tracing::info!(app = app_name, "tracing initialized");

    Ok(())
}

/// Initializes tracing for tests.
///
/// Safe to call from every test; only the first call installs a subscriber. Output goes through
/// the test writer so it is captured unless `--nocapture` is passed.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_LOG_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
