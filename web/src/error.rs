//! Error types for web handlers.
//!
//! Bridges [`ReconcileError`] onto HTTP responses. Clients only see a stable
//! code and a generic message; upstream and store details go to the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bus_booking_reconcile::ReconcileError;
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), code.to_string())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            message.into(),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(code: &str, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            code.to_string(),
        )
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Always `false`
    success: bool,
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            success: false,
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        let code = err.code();

        match err {
            ReconcileError::Validation(message) => Self::bad_request(code, message),
            ReconcileError::LinkageMissing { .. } => Self::bad_request(
                code,
                "Payment received but the booking could not be located, please contact support",
            ),
            other => Self::internal(code, "Payment could not be reconciled, please retry later")
                .with_source(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("INVALID_REFERENCE", "reference must not be empty");
        assert_eq!(
            err.to_string(),
            "[INVALID_REFERENCE] reference must not be empty"
        );
    }

    #[test]
    fn test_linkage_missing_is_client_error() {
        let err = AppError::from(ReconcileError::LinkageMissing {
            reference: "abc123".to_string(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "LINKAGE_MISSING");
    }

    #[test]
    fn test_upstream_detail_is_hidden() {
        let err = AppError::from(ReconcileError::upstream(
            "issuance",
            "connection refused to 10.0.0.7",
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
        assert!(!err.to_string().contains("10.0.0.7"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
