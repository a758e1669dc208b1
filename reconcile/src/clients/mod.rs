//! HTTP adapters for the external collaborators.
//!
//! All clients share the same conventions: a `reqwest` client with a request
//! timeout, an optional bearer token, and every non-2xx response mapped to
//! [`ReconcileError::Upstream`] with the response body kept for the logs.

pub mod invoicing;
pub mod issuance;
pub mod notifier;

pub use invoicing::HttpInvoicingClient;
pub use issuance::HttpIssuanceClient;
pub use notifier::WebhookNotifier;

use crate::error::{ReconcileError, Result};
use reqwest::{Client, RequestBuilder, Response, Url};
use std::time::Duration;

pub(crate) fn build_client(service: &'static str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ReconcileError::upstream(service, format!("failed to build HTTP client: {e}")))
}

pub(crate) fn trim_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Append path segments to `base_url`, percent-encoding each one.
pub(crate) fn endpoint(service: &'static str, base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ReconcileError::upstream(service, format!("invalid base URL: {e}")))?;

    url.path_segments_mut()
        .map_err(|()| ReconcileError::upstream(service, "base URL cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

pub(crate) fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Send a request and reject non-success statuses.
pub(crate) async fn send(service: &'static str, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ReconcileError::upstream(service, e))?;

    check_status(service, response).await
}

/// Reject non-success statuses, keeping the body for the logs.
pub(crate) async fn check_status(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ReconcileError::upstream(
        service,
        format!("HTTP {}: {body}", status.as_u16()),
    ))
}
