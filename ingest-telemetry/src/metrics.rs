use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub use metrics_exporter_prometheus::BuildError;

/// Installs the global Prometheus recorder and starts an HTTP listener on `listen_addr`.
///
/// The listener serves the scrape endpoint for every metric recorded through the `metrics`
/// facade. When `job_label` is set it is attached to all series as the `job` label. Called
/// outside a tokio runtime, the listener runs on its own single-threaded runtime in a background
/// thread, so it can be installed before the application runtime is built.
///
/// # Use Case
///
/// Use this when the ingestion binary should be scraped directly by Prometheus. Without a
/// recorder installed, all metric macros are no-ops.
pub fn init_metrics(listen_addr: SocketAddr, job_label: Option<&str>) -> Result<(), BuildError> {
    let mut builder = PrometheusBuilder::new().with_http_listener(listen_addr);

    if let Some(job_label) = job_label {
        builder = builder.add_global_label("job", job_label);
    }

    builder.install()?;

    Ok(())
}
