//! Notification dispatch interface.

use crate::error::Result;
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Everything a notification needs to identify the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketNotice {
    /// Payment reference
    pub payment_reference: PaymentReference,
    /// Cart the purchase was created from
    pub cart_id: CartId,
    /// Issued purchase id
    pub purchase_id: u64,
    /// Issued purchase UUID
    pub purchase_uuid: Uuid,
}

/// Customer notification channel.
///
/// Fire-and-forget from the finalizer's point of view: errors are logged by
/// the dispatcher and never propagate.
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    /// Send the issued ticket to the customer.
    ///
    /// # Errors
    ///
    /// Returns error if the notification could not be handed off.
    async fn send_success_ticket(&self, notice: &TicketNotice) -> Result<()>;

    /// Tell the customer that payment succeeded but issuance did not.
    ///
    /// # Errors
    ///
    /// Returns error if the notification could not be handed off.
    async fn send_failure_notice(&self, notice: &TicketNotice, reason: &str) -> Result<()>;
}
