//! Prometheus exporter setup.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and describe reconciliation metrics.
///
/// The handle renders the text exposition served on `/metrics`.
///
/// # Errors
///
/// Returns error if the bucket configuration is invalid or a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )?
        .install_recorder()?;

    bus_booking_reconcile::metrics::register_metrics();

    Ok(handle)
}
