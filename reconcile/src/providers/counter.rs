//! Issued-ticket counter interface.

use crate::error::Result;
use crate::types::PaymentReference;
use async_trait::async_trait;

/// Business counters for issued tickets (dashboards, daily totals).
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one more issued booking.
    ///
    /// # Errors
    ///
    /// Returns error if the counter store is unreachable.
    async fn increment_issued_ticket_counters(&self, reference: &PaymentReference) -> Result<()>;
}
