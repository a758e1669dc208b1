//! Booking finalizer.
//!
//! The state machine behind `GET /poll/{reference}`. One call observes the
//! invoice and reacts:
//!
//! | observed | reaction | status |
//! |----------|----------|--------|
//! | processed marker set | nothing | `alreadyProcessed` |
//! | no invoice | nothing | `notFound` |
//! | pending | mirror `payment_processing` | `paymentProcessing` |
//! | cancelled / failed | mirror, mark processed | `cancelled` / `paymentFailed` |
//! | paid, lock taken elsewhere | nothing | `paymentProcessing` |
//! | paid | issue ticket under the lock, effects, mark processed | `confirmed` |
//! | unrecognized code | nothing | `unknown` |
//!
//! # Paid sequence
//!
//! Runs under the processing lock, which is released on every exit path,
//! including a panic inside the sequence and a caller that drops the poll
//! before it finishes. The processed marker is set last,
//! so any failure before it leaves the reference retriable. A purchase that
//! was created but not completed is recorded in the [`PurchaseLedger`] and
//! reused by the retry instead of creating a second one.

use crate::effects::{EffectReport, SideEffectDispatcher};
use crate::error::{ReconcileError, Result};
use crate::metrics;
use crate::poller::{CartLink, InvoiceStatePoller, PollObservation};
use crate::providers::{
    BookingStatusUpdate, CompletionContext, IdempotencyGuard, Invoice, IssuanceSystem,
    PurchaseLedger, PurchaseOptions, PurchaseRecord, TicketNotice,
};
use crate::types::{CartId, ExternalInvoiceState, MirrorStatus, PaymentReference, PollStatus};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Locale and currency used when creating purchases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseDefaults {
    /// Locale for issued documents
    pub locale: String,
    /// Currency used when the invoice carries none
    pub currency: String,
}

impl Default for PurchaseDefaults {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            currency: "EUR".to_string(),
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizationOutcome {
    /// Canonical status
    pub status: PollStatus,
    /// Issued purchase (`confirmed` only)
    pub purchase: Option<PurchaseRecord>,
    /// Whether the issuance system reported tickets as issued (`confirmed` only)
    pub is_completed_purchase: Option<bool>,
    /// Human-readable note for the caller
    pub message: Option<String>,
    /// Side effects attempted during this poll
    pub effects: EffectReport,
}

impl FinalizationOutcome {
    fn status(status: PollStatus) -> Self {
        Self {
            status,
            purchase: None,
            is_completed_purchase: None,
            message: None,
            effects: EffectReport::new(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_effects(mut self, effects: EffectReport) -> Self {
        self.effects = effects;
        self
    }
}

/// Orchestrates reconciliation and ticket issuance for payment references.
pub struct BookingFinalizer {
    poller: InvoiceStatePoller,
    guard: Arc<dyn IdempotencyGuard>,
    issuance: Arc<dyn IssuanceSystem>,
    ledger: Arc<dyn PurchaseLedger>,
    effects: SideEffectDispatcher,
    defaults: PurchaseDefaults,
}

impl BookingFinalizer {
    /// Create a finalizer with default purchase options.
    #[must_use]
    pub fn new(
        poller: InvoiceStatePoller,
        guard: Arc<dyn IdempotencyGuard>,
        issuance: Arc<dyn IssuanceSystem>,
        ledger: Arc<dyn PurchaseLedger>,
        effects: SideEffectDispatcher,
    ) -> Self {
        Self {
            poller,
            guard,
            issuance,
            ledger,
            effects,
            defaults: PurchaseDefaults::default(),
        }
    }

    /// Override locale and default currency for created purchases.
    #[must_use]
    pub fn with_purchase_defaults(mut self, defaults: PurchaseDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Reconcile one payment reference.
    ///
    /// Intermediate states (no invoice yet, payment pending, lock held
    /// elsewhere) are statuses, not errors.
    ///
    /// # Errors
    ///
    /// - [`ReconcileError::LinkageMissing`] if the invoice is paid but no cart
    ///   is linked (not marked processed)
    /// - [`ReconcileError::Upstream`] / [`ReconcileError::Store`] if a
    ///   collaborator fails (not marked processed)
    /// - [`ReconcileError::Aborted`] if the paid sequence panicked
    pub async fn poll(&self, reference: &PaymentReference) -> Result<FinalizationOutcome> {
        let result = self.reconcile(reference).await;

        match &result {
            Ok(outcome) => metrics::record_poll(outcome.status.as_str()),
            Err(e) => metrics::record_poll_error(e.code()),
        }

        result
    }

    async fn reconcile(&self, reference: &PaymentReference) -> Result<FinalizationOutcome> {
        if self.guard.is_processed(reference).await? {
            tracing::debug!(reference = %reference, "Reference already processed");
            return Ok(FinalizationOutcome::status(PollStatus::AlreadyProcessed)
                .with_message("Payment already processed"));
        }

        let (state, invoice, cart) = match self.poller.poll(reference).await? {
            PollObservation::NotFound { .. } => {
                return Ok(FinalizationOutcome::status(PollStatus::NotFound)
                    .with_message("Invoice not recorded yet, retry later"));
            }
            PollObservation::Found {
                state,
                invoice,
                cart,
            } => (state, invoice, cart),
        };

        match state {
            ExternalInvoiceState::Pending => {
                let effects = self
                    .mirror(reference, cart.cart_id(), MirrorStatus::PaymentProcessing)
                    .await;
                Ok(FinalizationOutcome::status(PollStatus::PaymentProcessing)
                    .with_message("Payment is being processed")
                    .with_effects(effects))
            }
            ExternalInvoiceState::Cancelled => {
                self.settle_unpaid(reference, cart.cart_id(), PollStatus::Cancelled)
                    .await
            }
            ExternalInvoiceState::Failed => {
                self.settle_unpaid(reference, cart.cart_id(), PollStatus::PaymentFailed)
                    .await
            }
            ExternalInvoiceState::Paid => self.finalize_paid(reference, &invoice, cart).await,
            ExternalInvoiceState::Unknown(_) => Ok(FinalizationOutcome::status(PollStatus::Unknown)
                .with_message("Payment state not recognized")),
        }
    }

    /// Cancelled or failed: terminal without issuance, so no lock.
    async fn settle_unpaid(
        &self,
        reference: &PaymentReference,
        cart_id: Option<&CartId>,
        status: PollStatus,
    ) -> Result<FinalizationOutcome> {
        let mirror_status = if status == PollStatus::Cancelled {
            MirrorStatus::Cancelled
        } else {
            MirrorStatus::PaymentFailed
        };

        let effects = self.mirror(reference, cart_id, mirror_status).await;
        self.guard.mark_processed(reference).await?;

        tracing::info!(reference = %reference, status = %status, "Unpaid booking settled");

        Ok(FinalizationOutcome::status(status).with_effects(effects))
    }

    async fn mirror(
        &self,
        reference: &PaymentReference,
        cart_id: Option<&CartId>,
        status: MirrorStatus,
    ) -> EffectReport {
        let mut report = EffectReport::new();

        match cart_id {
            Some(cart_id) => report.push(
                self.effects
                    .mirror_status(cart_id, BookingStatusUpdate::new(status, reference.clone()))
                    .await,
            ),
            None => tracing::debug!(
                reference = %reference,
                status = %status,
                "No cart linked, skipping status mirror"
            ),
        }

        report
    }

    async fn finalize_paid(
        &self,
        reference: &PaymentReference,
        invoice: &Invoice,
        cart: CartLink,
    ) -> Result<FinalizationOutcome> {
        let cart_id = match cart {
            CartLink::Linked(cart_id) => cart_id,
            CartLink::Unlinked => {
                tracing::warn!(
                    reference = %reference,
                    invoice_id = %invoice.id,
                    "Invoice paid but no cart is linked"
                );
                return Err(ReconcileError::LinkageMissing {
                    reference: reference.to_string(),
                });
            }
            CartLink::Unavailable(e) => {
                tracing::error!(
                    reference = %reference,
                    invoice_id = %invoice.id,
                    error = %e,
                    "Invoice paid but the cart link could not be resolved"
                );
                return Err(e);
            }
        };

        if !self.guard.acquire_lock(reference).await? {
            metrics::record_lock_contention();
            tracing::info!(reference = %reference, "Finalization already in progress");
            return Ok(FinalizationOutcome::status(PollStatus::PaymentProcessing)
                .with_message("Payment is being finalized"));
        }

        // Released in the background if this future is dropped before the end
        let lease = LockLease::new(Arc::clone(&self.guard), reference.clone());
        let started = Instant::now();

        let result = AssertUnwindSafe(self.finalize_locked(reference, invoice, &cart_id))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ReconcileError::Aborted(panic_message(&*panic))));

        lease.release().await;

        metrics::record_finalization_duration(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::error!(
                reference = %reference,
                cart_id = %cart_id,
                error = %e,
                "Finalization failed, reference left retriable"
            );
        }

        result
    }

    async fn finalize_locked(
        &self,
        reference: &PaymentReference,
        invoice: &Invoice,
        cart_id: &CartId,
    ) -> Result<FinalizationOutcome> {
        let purchase = self.obtain_purchase(reference, invoice, cart_id).await?;

        let completed = self
            .issuance
            .complete_purchase(
                &purchase,
                CompletionContext {
                    payment_reference: reference.clone(),
                    persist_payload: true,
                },
            )
            .await?;
        let is_completed_purchase = completed.is_completed();

        let mut effects = EffectReport::new();
        effects.push(
            self.effects
                .mirror_status(
                    cart_id,
                    BookingStatusUpdate::new(MirrorStatus::Confirmed, reference.clone())
                        .with_purchase_id(purchase.id),
                )
                .await,
        );

        let notice = TicketNotice {
            payment_reference: reference.clone(),
            cart_id: cart_id.clone(),
            purchase_id: purchase.id,
            purchase_uuid: purchase.uuid,
        };
        let message = if is_completed_purchase {
            effects.push(self.effects.notify_success(&notice).await);
            None
        } else {
            let reason = format!(
                "Issuance did not complete (status: {}, poll outcome: {})",
                completed.status.as_deref().unwrap_or("none"),
                completed.poll_outcome.as_deref().unwrap_or("none"),
            );
            tracing::warn!(
                reference = %reference,
                purchase_id = purchase.id,
                %reason,
                "Purchase not completed"
            );
            effects.push(self.effects.notify_failure(&notice, &reason).await);
            Some("Payment confirmed, ticket issuance is pending".to_string())
        };

        effects.push(self.effects.increment_counters(reference).await);

        self.guard.mark_processed(reference).await?;

        tracing::info!(
            reference = %reference,
            cart_id = %cart_id,
            purchase_id = purchase.id,
            purchase_uuid = %purchase.uuid,
            is_completed_purchase,
            failed_effects = effects.failures().count(),
            "Booking finalized"
        );

        Ok(FinalizationOutcome {
            status: PollStatus::Confirmed,
            purchase: Some(purchase),
            is_completed_purchase: Some(is_completed_purchase),
            message,
            effects,
        })
    }

    /// Reuse the purchase an earlier attempt created, or create one.
    async fn obtain_purchase(
        &self,
        reference: &PaymentReference,
        invoice: &Invoice,
        cart_id: &CartId,
    ) -> Result<PurchaseRecord> {
        if let Some(purchase) = self.ledger.recorded_attempt(reference).await? {
            tracing::info!(
                reference = %reference,
                purchase_id = purchase.id,
                "Reusing purchase from an earlier attempt"
            );
            return Ok(purchase);
        }

        let options = PurchaseOptions {
            skip_validation: true,
            locale: self.defaults.locale.clone(),
            currency: invoice
                .currency
                .clone()
                .unwrap_or_else(|| self.defaults.currency.clone()),
        };

        let purchase = self.issuance.create_purchase(cart_id, options).await?;
        tracing::info!(
            reference = %reference,
            cart_id = %cart_id,
            purchase_id = purchase.id,
            "Purchase created"
        );

        if let Err(e) = self.ledger.record_attempt(reference, purchase).await {
            tracing::error!(
                reference = %reference,
                purchase_id = purchase.id,
                error = %e,
                "Failed to record purchase attempt, a retry may create a duplicate"
            );
            return Err(e);
        }

        Ok(purchase)
    }
}

/// Processing lock held by one finalization.
///
/// `release` frees it in line. If the holder is dropped first (the caller
/// went away mid-sequence), `Drop` spawns the release on the current
/// runtime instead of leaving the lock to its lease.
struct LockLease {
    guard: Arc<dyn IdempotencyGuard>,
    reference: Option<PaymentReference>,
}

impl LockLease {
    const fn new(guard: Arc<dyn IdempotencyGuard>, reference: PaymentReference) -> Self {
        Self {
            guard,
            reference: Some(reference),
        }
    }

    async fn release(mut self) {
        if let Some(reference) = self.reference.take() {
            release_lock(self.guard.as_ref(), &reference).await;
        }
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        let Some(reference) = self.reference.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    reference = %reference,
                    "Finalization dropped before completion, releasing processing lock"
                );
                let guard = Arc::clone(&self.guard);
                handle.spawn(async move {
                    release_lock(guard.as_ref(), &reference).await;
                });
            }
            Err(_) => tracing::error!(
                reference = %reference,
                "No runtime to release processing lock, it will expire with its lease"
            ),
        }
    }
}

async fn release_lock(guard: &dyn IdempotencyGuard, reference: &PaymentReference) {
    if let Err(e) = guard.release_lock(reference).await {
        tracing::error!(
            reference = %reference,
            error = %e,
            "Failed to release processing lock, it will expire with its lease"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic in finalization".to_string())
}
