//! Cart-reference resolver interface.

use crate::error::Result;
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;

/// Resolves the issuance-system cart linked to a payment reference.
///
/// The link is recorded when the booking is initiated.
#[async_trait]
pub trait CartResolver: Send + Sync {
    /// Look up the cart for a reference.
    ///
    /// Returns `Ok(None)` when no link exists.
    ///
    /// # Errors
    ///
    /// Returns error if the lookup store is unreachable.
    async fn resolve_cart_id(&self, reference: &PaymentReference) -> Result<Option<CartId>>;
}
