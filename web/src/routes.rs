//! Router construction.

use crate::handlers::{health, poll};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// | Method | Path | Handler |
/// |--------|------|---------|
/// | GET | `/poll/:reference` | reconcile a payment |
/// | GET | `/health` | liveness |
/// | GET | `/ready` | readiness (Redis) |
/// | GET | `/metrics` | Prometheus |
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/poll/:reference", get(poll::poll_payment))
        .route("/poll", get(poll::missing_reference))
        .route("/poll/", get(poll::missing_reference))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
