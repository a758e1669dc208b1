//! Application state for Axum handlers.

use bus_booking_reconcile::BookingFinalizer;
use metrics_exporter_prometheus::PrometheusHandle;
use redis::aio::ConnectionManager;
use std::sync::Arc;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Reconciliation core
    pub finalizer: Arc<BookingFinalizer>,
    /// Redis connection probed by `/ready` (absent in tests)
    pub redis: Option<ConnectionManager>,
    /// Prometheus renderer for `/metrics` (absent when metrics are disabled)
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state around a finalizer.
    #[must_use]
    pub const fn new(finalizer: Arc<BookingFinalizer>) -> Self {
        Self {
            finalizer,
            redis: None,
            metrics: None,
        }
    }

    /// Probe this connection for readiness.
    #[must_use]
    pub fn with_redis(mut self, redis: ConnectionManager) -> Self {
        self.redis = Some(redis);
        self
    }

    /// Serve metrics from this handle.
    #[must_use]
    pub fn with_metrics(mut self, metrics: PrometheusHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
