//! Payment poll endpoint.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use bus_booking_reconcile::{FinalizationOutcome, PaymentReference, PollStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Poll response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    /// `true` for every recognized status
    pub success: bool,
    /// Canonical reconciliation status
    pub status: PollStatus,
    /// Issued purchase id (`confirmed` only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<u64>,
    /// Issued purchase UUID (`confirmed` only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_uuid: Option<Uuid>,
    /// Note for the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<FinalizationOutcome> for PollResponse {
    fn from(outcome: FinalizationOutcome) -> Self {
        Self {
            success: true,
            status: outcome.status,
            purchase_id: outcome.purchase.map(|p| p.id),
            purchase_uuid: outcome.purchase.map(|p| p.uuid),
            message: outcome.message,
        }
    }
}

/// Reconcile a payment reference.
///
/// # Endpoint
///
/// ```text
/// GET /poll/{reference}
/// ```
///
/// # Responses
///
/// - 200: any recognized status, e.g.
///   `{"success":true,"status":"confirmed","purchaseId":1000,"purchaseUuid":"..."}`
/// - 400: malformed reference, or paid with no linked booking
/// - 500: provider or infrastructure failure
///
/// # Errors
///
/// See [`AppError`]'s conversion from the reconciliation error.
pub async fn poll_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> WebResult<Json<PollResponse>> {
    let reference = PaymentReference::parse(reference)?;
    let outcome = state.finalizer.poll(&reference).await?;

    tracing::debug!(
        reference = %reference,
        status = %outcome.status,
        effects = outcome.effects.outcomes().len(),
        "Poll handled"
    );

    Ok(Json(PollResponse::from(outcome)))
}

/// `GET /poll` and `GET /poll/` without a reference.
///
/// # Errors
///
/// Always a 400.
#[allow(clippy::unused_async)]
pub async fn missing_reference() -> WebResult<Json<PollResponse>> {
    Err(AppError::bad_request(
        "INVALID_REFERENCE",
        "reference must not be empty",
    ))
}
