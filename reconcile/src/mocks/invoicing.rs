//! Mock invoicing provider for testing.

use crate::error::{ReconcileError, Result};
use crate::providers::{BookingStatusUpdate, Invoice, InvoicingProvider, MirrorResult};
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock invoicing provider.
///
/// Invoices are configured per reference; mirrored statuses are recorded.
#[derive(Debug, Clone, Default)]
pub struct MockInvoicingProvider {
    invoices: Arc<Mutex<HashMap<String, Vec<Invoice>>>>,
    mirrored: Arc<Mutex<Vec<(CartId, BookingStatusUpdate)>>>,
    search_calls: Arc<AtomicUsize>,
    fail_search: Arc<AtomicBool>,
    ignore_mirror: Arc<AtomicBool>,
}

impl MockInvoicingProvider {
    /// Create a provider with no invoices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the invoices returned for a reference.
    pub fn set_invoices(&self, reference: &str, invoices: Vec<Invoice>) {
        self.invoices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.to_string(), invoices);
    }

    /// Return a single invoice with the given settlement code.
    pub fn set_settlement_code(&self, reference: &str, code: &str) {
        self.set_invoices(reference, vec![Invoice::new(format!("INV/{reference}"), code)]);
    }

    /// Make searches fail with an upstream error.
    pub fn set_search_failing(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    /// Make the provider drop status mirrors.
    pub fn set_mirror_ignored(&self, ignore: bool) {
        self.ignore_mirror.store(ignore, Ordering::SeqCst);
    }

    /// Number of search calls.
    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Every status mirror received, in order.
    #[must_use]
    pub fn mirrored(&self) -> Vec<(CartId, BookingStatusUpdate)> {
        self.mirrored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InvoicingProvider for MockInvoicingProvider {
    async fn search_by_reference(&self, reference: &PaymentReference) -> Result<Vec<Invoice>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_search.load(Ordering::SeqCst) {
            return Err(ReconcileError::upstream("invoicing", "mock search failure"));
        }

        Ok(self
            .invoices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn update_booking_status(
        &self,
        cart_id: &CartId,
        update: BookingStatusUpdate,
    ) -> MirrorResult {
        self.mirrored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((cart_id.clone(), update));

        if self.ignore_mirror.load(Ordering::SeqCst) {
            MirrorResult::Ignored {
                reason: "mock provider rejected the update".to_string(),
            }
        } else {
            MirrorResult::Applied
        }
    }
}
