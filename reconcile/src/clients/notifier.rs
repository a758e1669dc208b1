//! Webhook notification dispatch.

use crate::clients::{build_client, send, trim_base_url};
use crate::error::Result;
use crate::providers::{NotificationDispatch, TicketNotice};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const SERVICE: &str = "notifications";

#[derive(Debug, Serialize)]
struct FailureNotice<'a> {
    #[serde(flatten)]
    notice: &'a TicketNotice,
    reason: &'a str,
}

/// Hands notifications to the notification service, which renders and
/// delivers them.
///
/// - `POST {base}/notifications/ticket-issued` with a [`TicketNotice`]
/// - `POST {base}/notifications/ticket-failed` with the notice and a `reason`
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    base_url: String,
}

impl WebhookNotifier {
    /// Create a notifier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Upstream`] if the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(SERVICE, timeout)?,
            base_url: trim_base_url(base_url),
        })
    }
}

#[async_trait]
impl NotificationDispatch for WebhookNotifier {
    async fn send_success_ticket(&self, notice: &TicketNotice) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/notifications/ticket-issued", self.base_url))
            .json(notice);

        send(SERVICE, request).await?;
        Ok(())
    }

    async fn send_failure_notice(&self, notice: &TicketNotice, reason: &str) -> Result<()> {
        let request = self
            .client
            .post(format!("{}/notifications/ticket-failed", self.base_url))
            .json(&FailureNotice { notice, reason });

        send(SERVICE, request).await?;
        Ok(())
    }
}
