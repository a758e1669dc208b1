//! Health, readiness and metrics endpoints.

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::time::Duration;

const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Liveness check. Does not touch dependencies.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub ready: bool,
    /// Redis answered `PING` (omitted when no Redis is wired)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<bool>,
}

/// Readiness check.
///
/// Pings Redis, which holds locks, markers and the purchase ledger.
///
/// - 200 OK: ready
/// - 503 Service Unavailable: Redis unreachable
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let redis = match state.redis {
        Some(mut conn) => {
            let ping = tokio::time::timeout(READINESS_TIMEOUT, async {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                pong
            })
            .await;

            let healthy = matches!(ping, Ok(Ok(_)));
            if !healthy {
                tracing::warn!("Readiness check failed: Redis did not answer PING");
            }
            Some(healthy)
        }
        None => None,
    };

    let ready = redis.unwrap_or(true);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, redis }))
}

/// Prometheus text exposition.
///
/// # Errors
///
/// 404 when metrics are disabled.
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> Result<String, AppError> {
    state
        .metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .ok_or_else(|| AppError::not_found("Metrics are disabled"))
}
