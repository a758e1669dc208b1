//! Invoicing provider interface.

use crate::error::Result;
use crate::types::{CartId, MirrorStatus, PaymentReference};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invoice as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Provider-side invoice identifier
    pub id: String,
    /// Raw settlement code (`paid`, `in_payment`, ...)
    pub settlement_code: String,
    /// ISO 4217 currency code, when the provider reports one
    #[serde(default)]
    pub currency: Option<String>,
}

impl Invoice {
    /// Create an invoice.
    #[must_use]
    pub fn new(id: impl Into<String>, settlement_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settlement_code: settlement_code.into(),
            currency: None,
        }
    }

    /// Attach a currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Status copy pushed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingStatusUpdate {
    /// Mirrored status
    pub status: MirrorStatus,
    /// Reference the booking was paid with
    pub payment_reference: PaymentReference,
    /// Issued purchase, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<u64>,
    /// When the status was observed
    pub updated_at: DateTime<Utc>,
}

impl BookingStatusUpdate {
    /// Create an update stamped with the current time.
    #[must_use]
    pub fn new(status: MirrorStatus, payment_reference: PaymentReference) -> Self {
        Self {
            status,
            payment_reference,
            purchase_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Attach the issued purchase id.
    #[must_use]
    pub const fn with_purchase_id(mut self, purchase_id: u64) -> Self {
        self.purchase_id = Some(purchase_id);
        self
    }
}

/// Result of a status-mirror update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorResult {
    /// Provider stored the status
    Applied,
    /// Provider could not store it; the booking is unaffected
    Ignored {
        /// Why the update was dropped
        reason: String,
    },
}

/// External invoicing provider.
///
/// Read-only from the poller's point of view; the only write is the
/// best-effort status mirror.
#[async_trait]
pub trait InvoicingProvider: Send + Sync {
    /// List all invoices tied to a payment reference.
    ///
    /// An empty list means the invoice has not been recorded yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Upstream`] if the provider cannot be
    /// queried.
    async fn search_by_reference(&self, reference: &PaymentReference) -> Result<Vec<Invoice>>;

    /// Mirror a booking status onto the provider.
    ///
    /// Never fails: transport or provider errors come back as
    /// [`MirrorResult::Ignored`].
    async fn update_booking_status(
        &self,
        cart_id: &CartId,
        update: BookingStatusUpdate,
    ) -> MirrorResult;
}
