//! Ticket issuance system interface.

use crate::error::Result;
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purchase record in the issuance system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Numeric purchase id
    pub id: u64,
    /// Purchase UUID
    pub uuid: Uuid,
}

/// Options for creating a purchase from a cart.
///
/// The finalizer always uses a fixed fallback policy: extra validation is
/// skipped (the seats are already held) and locale/currency come from
/// configuration unless the invoice carries a currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOptions {
    /// Skip cart re-validation
    pub skip_validation: bool,
    /// Locale for issued documents
    pub locale: String,
    /// ISO 4217 currency code
    pub currency: String,
}

/// Context passed when completing a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionContext {
    /// Payment reference, stored on the purchase for traceability
    pub payment_reference: PaymentReference,
    /// Ask the issuance system to persist the full purchase payload for
    /// later ticket retrieval
    pub persist_payload: bool,
}

/// Result of completing a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPurchase {
    /// Purchase status reported by the issuance system
    #[serde(default)]
    pub status: Option<String>,
    /// Outcome of the issuance system's own payment poll
    #[serde(default)]
    pub poll_outcome: Option<String>,
    /// Full purchase payload
    #[serde(default)]
    pub purchase: serde_json::Value,
}

impl CompletedPurchase {
    /// Whether tickets were actually issued.
    ///
    /// True when either the poll outcome or the purchase status reads
    /// `completed`, `booked` or `confirmed` (case-insensitive).
    #[must_use]
    pub fn is_completed(&self) -> bool {
        fn completed(value: Option<&str>) -> bool {
            value.is_some_and(|v| {
                matches!(
                    v.trim().to_ascii_lowercase().as_str(),
                    "completed" | "booked" | "confirmed"
                )
            })
        }

        completed(self.poll_outcome.as_deref()) || completed(self.status.as_deref())
    }
}

/// External ticket issuance system.
#[async_trait]
pub trait IssuanceSystem: Send + Sync {
    /// Create a purchase for a cart.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Upstream`] if the purchase cannot be
    /// created.
    async fn create_purchase(
        &self,
        cart_id: &CartId,
        options: PurchaseOptions,
    ) -> Result<PurchaseRecord>;

    /// Complete (confirm) a purchase.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Upstream`] if the purchase cannot be
    /// completed.
    async fn complete_purchase(
        &self,
        purchase: &PurchaseRecord,
        context: CompletionContext,
    ) -> Result<CompletedPurchase>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(status: Option<&str>, poll_outcome: Option<&str>) -> CompletedPurchase {
        CompletedPurchase {
            status: status.map(str::to_string),
            poll_outcome: poll_outcome.map(str::to_string),
            purchase: serde_json::Value::Null,
        }
    }

    #[test]
    fn completion_reads_either_field() {
        assert!(completed(Some("Booked"), None).is_completed());
        assert!(completed(None, Some("completed")).is_completed());
        assert!(completed(Some("pending"), Some("confirmed")).is_completed());
        assert!(!completed(Some("pending"), Some("failed")).is_completed());
        assert!(!completed(None, None).is_completed());
    }
}
