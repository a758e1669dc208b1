//! Purchase-attempt ledger interface.
//!
//! The processed marker is only set after the whole paid sequence succeeds.
//! If the process dies between creating and completing a purchase, the retry
//! would create a second purchase. The ledger closes that gap: the created
//! [`PurchaseRecord`] is recorded under the payment reference right after
//! creation, and every attempt checks the ledger before creating.

use crate::error::Result;
use crate::providers::PurchaseRecord;
use crate::types::PaymentReference;
use async_trait::async_trait;

/// Local record of purchases created per payment reference.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Purchase previously created for this reference, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the ledger is unreachable.
    async fn recorded_attempt(&self, reference: &PaymentReference)
    -> Result<Option<PurchaseRecord>>;

    /// Record the purchase created for this reference.
    ///
    /// # Errors
    ///
    /// Returns error if the ledger is unreachable.
    async fn record_attempt(
        &self,
        reference: &PaymentReference,
        purchase: PurchaseRecord,
    ) -> Result<()>;
}
