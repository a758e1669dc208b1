//! Invoice state poller.
//!
//! Reads settlement state from the invoicing provider and maps the raw code
//! onto [`ExternalInvoiceState`]. Never writes to the provider.

use crate::error::{ReconcileError, Result};
use crate::providers::{CartResolver, Invoice, InvoicingProvider};
use crate::types::{CartId, ExternalInvoiceState, PaymentReference};
use std::sync::Arc;

/// Outcome of resolving the cart linked to a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartLink {
    /// A cart is linked.
    Linked(CartId),
    /// The resolver answered and no cart is linked.
    Unlinked,
    /// The resolver could not answer.
    Unavailable(ReconcileError),
}

impl CartLink {
    /// Linked cart, if one was resolved.
    #[must_use]
    pub const fn cart_id(&self) -> Option<&CartId> {
        match self {
            Self::Linked(cart_id) => Some(cart_id),
            Self::Unlinked | Self::Unavailable(_) => None,
        }
    }
}

/// What one poll observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollObservation {
    /// The provider has no invoice for the reference yet.
    NotFound {
        /// Cart lookup outcome
        cart: CartLink,
    },
    /// An invoice exists.
    Found {
        /// Canonical settlement state of the first invoice
        state: ExternalInvoiceState,
        /// The invoice the state was read from
        invoice: Invoice,
        /// Cart lookup outcome
        cart: CartLink,
    },
}

/// Queries the invoicing provider and the cart resolver for one reference.
#[derive(Clone)]
pub struct InvoiceStatePoller {
    invoicing: Arc<dyn InvoicingProvider>,
    carts: Arc<dyn CartResolver>,
}

impl InvoiceStatePoller {
    /// Create a poller.
    #[must_use]
    pub fn new(invoicing: Arc<dyn InvoicingProvider>, carts: Arc<dyn CartResolver>) -> Self {
        Self { invoicing, carts }
    }

    /// Observe the current settlement state.
    ///
    /// A missing or unresolvable cart link is logged and reported on the
    /// observation; only the paid path treats it as fatal.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Upstream`] if the provider query fails.
    pub async fn poll(&self, reference: &PaymentReference) -> Result<PollObservation> {
        let cart = match self.carts.resolve_cart_id(reference).await {
            Ok(Some(cart_id)) => CartLink::Linked(cart_id),
            Ok(None) => {
                tracing::debug!(reference = %reference, "No cart linked to reference");
                CartLink::Unlinked
            }
            Err(e) => {
                tracing::warn!(reference = %reference, error = %e, "Cart lookup failed");
                CartLink::Unavailable(e)
            }
        };

        let invoices = self.invoicing.search_by_reference(reference).await?;

        // Several invoices for one reference would be a provider-side anomaly
        if invoices.len() > 1 {
            tracing::warn!(
                reference = %reference,
                count = invoices.len(),
                "Multiple invoices for reference, using the first"
            );
        }

        let Some(invoice) = invoices.into_iter().next() else {
            tracing::debug!(reference = %reference, "Invoice not recorded yet");
            return Ok(PollObservation::NotFound { cart });
        };

        let state = ExternalInvoiceState::from_raw_code(&invoice.settlement_code);
        if let ExternalInvoiceState::Unknown(raw) = &state {
            tracing::warn!(
                reference = %reference,
                invoice_id = %invoice.id,
                code = %raw,
                "Unrecognized settlement code"
            );
        } else {
            tracing::debug!(reference = %reference, state = %state, "Invoice state observed");
        }

        Ok(PollObservation::Found {
            state,
            invoice,
            cart,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::mocks::{MockCartResolver, MockInvoicingProvider};

    fn poller(invoicing: &MockInvoicingProvider, carts: &MockCartResolver) -> InvoiceStatePoller {
        InvoiceStatePoller::new(Arc::new(invoicing.clone()), Arc::new(carts.clone()))
    }

    #[tokio::test]
    async fn test_no_invoice_is_not_found() {
        let invoicing = MockInvoicingProvider::new();
        let carts = MockCartResolver::new();
        carts.link("abc123", "cart-789");

        let observation = poller(&invoicing, &carts)
            .poll(&PaymentReference::parse("abc123").unwrap())
            .await
            .unwrap();

        assert_eq!(
            observation,
            PollObservation::NotFound {
                cart: CartLink::Linked(CartId::new("cart-789"))
            }
        );
    }

    #[tokio::test]
    async fn test_codes_are_mapped() {
        let invoicing = MockInvoicingProvider::new();
        let carts = MockCartResolver::new();
        let poller = poller(&invoicing, &carts);
        let reference = PaymentReference::parse("abc123").unwrap();

        for (code, expected) in [
            ("paid", ExternalInvoiceState::Paid),
            ("in_payment", ExternalInvoiceState::Pending),
            ("cancel", ExternalInvoiceState::Cancelled),
            ("reversed", ExternalInvoiceState::Failed),
            ("partial", ExternalInvoiceState::Unknown("partial".to_string())),
        ] {
            invoicing.set_settlement_code("abc123", code);
            match poller.poll(&reference).await.unwrap() {
                PollObservation::Found { state, .. } => assert_eq!(state, expected),
                other @ PollObservation::NotFound { .. } => {
                    unreachable!("expected an invoice, got {other:?}")
                }
            }
        }
    }

    #[tokio::test]
    async fn test_cart_lookup_failure_is_not_fatal() {
        let invoicing = MockInvoicingProvider::new();
        let carts = MockCartResolver::new();
        carts.set_failing(true);
        invoicing.set_settlement_code("abc123", "pending");

        let observation = poller(&invoicing, &carts)
            .poll(&PaymentReference::parse("abc123").unwrap())
            .await
            .unwrap();

        match observation {
            PollObservation::Found { cart, .. } => {
                assert!(matches!(cart, CartLink::Unavailable(ReconcileError::Store(_))));
                assert_eq!(cart.cart_id(), None);
            }
            other @ PollObservation::NotFound { .. } => {
                unreachable!("expected an invoice, got {other:?}")
            }
        }
    }

    #[tokio::test]
    async fn test_provider_failure_is_upstream_error() {
        let invoicing = MockInvoicingProvider::new();
        invoicing.set_search_failing(true);

        let err = poller(&invoicing, &MockCartResolver::new())
            .poll(&PaymentReference::parse("abc123").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Upstream { service: "invoicing", .. }));
    }
}
