//! HTTP ticket issuance client.

use crate::clients::{authorize, build_client, endpoint, send, trim_base_url};
use crate::error::{ReconcileError, Result};
use crate::providers::{
    CompletedPurchase, CompletionContext, IssuanceSystem, PurchaseOptions, PurchaseRecord,
};
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

const SERVICE: &str = "issuance";

#[derive(Debug, Serialize)]
struct CompletePurchaseRequest<'a> {
    uuid: Uuid,
    payment_reference: &'a PaymentReference,
    persist_payload: bool,
}

/// Issuance system over its REST API.
///
/// - `POST {base}/carts/{cart}/purchases` with [`PurchaseOptions`] → `{id, uuid}`
/// - `POST {base}/purchases/{id}/complete` → `{status, poll_outcome, purchase}`
#[derive(Clone)]
pub struct HttpIssuanceClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpIssuanceClient {
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
impl IssuanceSystem for HttpIssuanceClient {
    async fn create_purchase(
        &self,
        cart_id: &CartId,
        options: PurchaseOptions,
    ) -> Result<PurchaseRecord> {
        let url = endpoint(
            SERVICE,
            &self.base_url,
            &["carts", cart_id.as_str(), "purchases"],
        )?;
        let request = self.client.post(url).json(&options);

        send(SERVICE, authorize(request, self.api_token.as_deref()))
            .await?
            .json::<PurchaseRecord>()
            .await
            .map_err(|e| ReconcileError::upstream(SERVICE, format!("invalid purchase: {e}")))
    }

    async fn complete_purchase(
        &self,
        purchase: &PurchaseRecord,
        context: CompletionContext,
    ) -> Result<CompletedPurchase> {
        let purchase_id = purchase.id.to_string();
        let url = endpoint(
            SERVICE,
            &self.base_url,
            &["purchases", purchase_id.as_str(), "complete"],
        )?;
        let request = self.client.post(url).json(&CompletePurchaseRequest {
            uuid: purchase.uuid,
            payment_reference: &context.payment_reference,
            persist_payload: context.persist_payload,
        });

        send(SERVICE, authorize(request, self.api_token.as_deref()))
            .await?
            .json::<CompletedPurchase>()
            .await
            .map_err(|e| ReconcileError::upstream(SERVICE, format!("invalid completion: {e}")))
    }
}
