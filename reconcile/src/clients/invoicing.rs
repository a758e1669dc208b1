//! HTTP invoicing provider client.

use crate::clients::{authorize, build_client, check_status, endpoint, trim_base_url};
use crate::error::{ReconcileError, Result};
use crate::providers::{BookingStatusUpdate, Invoice, InvoicingProvider, MirrorResult};
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "invoicing";

#[derive(Debug, Deserialize)]
struct InvoiceSearchResponse {
    #[serde(default)]
    invoices: Vec<Invoice>,
}

/// Invoicing provider over its REST API.
///
/// - `GET {base}/invoices?reference={ref}` → `{"invoices": [...]}`
/// - `POST {base}/bookings/{cart}/status` with a [`BookingStatusUpdate`]
#[derive(Clone)]
pub struct HttpInvoicingClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpInvoicingClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Upstream`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(SERVICE, timeout)?,
            base_url: trim_base_url(base_url),
            api_token,
        })
    }
}

#[async_trait]
impl InvoicingProvider for HttpInvoicingClient {
    async fn search_by_reference(&self, reference: &PaymentReference) -> Result<Vec<Invoice>> {
        let request = self
            .client
            .get(format!("{}/invoices", self.base_url))
            .query(&[("reference", reference.as_str())]);

        let response = authorize(request, self.api_token.as_deref())
            .send()
            .await
            .map_err(|e| ReconcileError::upstream(SERVICE, e))?;

        // Some deployments answer 404 instead of an empty list
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let body: InvoiceSearchResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| ReconcileError::upstream(SERVICE, format!("invalid search response: {e}")))?;

        Ok(body.invoices)
    }

    async fn update_booking_status(
        &self,
        cart_id: &CartId,
        update: BookingStatusUpdate,
    ) -> MirrorResult {
        let url = match endpoint(
            SERVICE,
            &self.base_url,
            &["bookings", cart_id.as_str(), "status"],
        ) {
            Ok(url) => url,
            Err(e) => {
                return MirrorResult::Ignored {
                    reason: e.to_string(),
                };
            }
        };
        let request = self.client.post(url).json(&update);

        let response = match authorize(request, self.api_token.as_deref()).send().await {
            Ok(response) => response,
            Err(e) => {
                return MirrorResult::Ignored {
                    reason: e.to_string(),
                };
            }
        };

        match response.status() {
            status if status.is_success() => MirrorResult::Applied,
            StatusCode::NOT_FOUND => MirrorResult::Ignored {
                reason: format!("booking for cart {cart_id} not found"),
            },
            status => MirrorResult::Ignored {
                reason: format!("HTTP {}", status.as_u16()),
            },
        }
    }
}
