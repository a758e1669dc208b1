//! End-to-end properties of the booking finalizer, wired with mock
//! collaborators.

#![allow(clippy::unwrap_used)] // Test code

use bus_booking_reconcile::mocks::{
    MockCartResolver, MockCounterStore, MockIdempotencyGuard, MockInvoicingProvider,
    MockIssuanceSystem, MockNotificationDispatch,
};
use bus_booking_reconcile::providers::{GuardSettings, IdempotencyGuard, PurchaseLedger};
use bus_booking_reconcile::stores::{
    FallbackIdempotencyGuard, InMemoryIdempotencyGuard, InMemoryPurchaseLedger,
};
use bus_booking_reconcile::{
    BookingFinalizer, EffectKind, InvoiceStatePoller, MirrorStatus, PaymentReference, PollStatus,
    ReconcileError, SideEffectDispatcher,
};
use std::sync::Arc;
use std::time::Duration;

/// Finalizer plus handles on every collaborator.
struct Harness {
    invoicing: MockInvoicingProvider,
    carts: MockCartResolver,
    guard: MockIdempotencyGuard,
    issuance: MockIssuanceSystem,
    ledger: InMemoryPurchaseLedger,
    notifications: MockNotificationDispatch,
    counters: MockCounterStore,
    finalizer: Arc<BookingFinalizer>,
}

impl Harness {
    fn new() -> Self {
        let guard = MockIdempotencyGuard::new();
        Self::with_guard(guard.clone(), Arc::new(guard))
    }

    fn with_guard(guard: MockIdempotencyGuard, wired: Arc<dyn IdempotencyGuard>) -> Self {
        let invoicing = MockInvoicingProvider::new();
        let carts = MockCartResolver::new();
        let issuance = MockIssuanceSystem::new();
        let ledger = InMemoryPurchaseLedger::new();
        let notifications = MockNotificationDispatch::new();
        let counters = MockCounterStore::new();

        let finalizer = BookingFinalizer::new(
            InvoiceStatePoller::new(Arc::new(invoicing.clone()), Arc::new(carts.clone())),
            wired,
            Arc::new(issuance.clone()),
            Arc::new(ledger.clone()),
            SideEffectDispatcher::new(
                Arc::new(invoicing.clone()),
                Arc::new(notifications.clone()),
                Arc::new(counters.clone()),
            ),
        );

        Self {
            invoicing,
            carts,
            guard,
            issuance,
            ledger,
            notifications,
            counters,
            finalizer: Arc::new(finalizer),
        }
    }

    /// `abc123` is paid and linked to `cart-789`.
    fn paid_and_linked(self) -> Self {
        self.invoicing.set_settlement_code("abc123", "paid");
        self.carts.link("abc123", "cart-789");
        self
    }
}

fn abc123() -> PaymentReference {
    PaymentReference::parse("abc123").unwrap()
}

// ============================================================================
// Paid path
// ============================================================================

#[tokio::test]
async fn paid_reference_is_confirmed_with_purchase_identifiers() {
    let h = Harness::new().paid_and_linked();

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
    let purchase = outcome.purchase.unwrap();
    assert_eq!(purchase.id, 1000);
    assert_eq!(outcome.is_completed_purchase, Some(true));

    assert_eq!(h.notifications.success_calls(), 1);
    assert_eq!(h.notifications.failure_calls(), 0);
    assert_eq!(h.counters.increment_calls(), 1);
    assert!(h.guard.is_marked(&abc123()));
    assert!(!h.guard.is_locked(&abc123()));

    let mirrored = h.invoicing.mirrored();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].0.as_str(), "cart-789");
    assert_eq!(mirrored[0].1.status, MirrorStatus::Confirmed);
    assert_eq!(mirrored[0].1.purchase_id, Some(purchase.id));
}

#[tokio::test]
async fn successive_paid_polls_create_one_purchase() {
    let h = Harness::new().paid_and_linked();

    let first = h.finalizer.poll(&abc123()).await.unwrap();
    let second = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(first.status, PollStatus::Confirmed);
    assert_eq!(second.status, PollStatus::AlreadyProcessed);
    assert_eq!(h.issuance.create_calls(), 1);
    assert_eq!(h.notifications.success_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_paid_polls_race_for_the_lock() {
    const POLLS: usize = 8;

    let h = Harness::new().paid_and_linked();
    h.issuance.set_create_delay(Duration::from_millis(500));

    let handles: Vec<_> = (0..POLLS)
        .map(|_| {
            let finalizer = Arc::clone(&h.finalizer);
            tokio::spawn(async move { finalizer.poll(&abc123()).await })
        })
        .collect();

    let mut statuses = Vec::with_capacity(POLLS);
    for handle in handles {
        statuses.push(handle.await.unwrap().unwrap().status);
    }

    assert_eq!(h.issuance.create_calls(), 1);
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == PollStatus::Confirmed)
            .count(),
        1
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == PollStatus::PaymentProcessing)
            .count(),
        POLLS - 1
    );
    assert_eq!(h.notifications.success_calls(), 1);
}

#[tokio::test]
async fn lock_held_elsewhere_reports_processing_without_effects() {
    let h = Harness::new().paid_and_linked();
    assert!(h.guard.acquire_lock(&abc123()).await.unwrap());

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::PaymentProcessing);
    assert!(outcome.effects.is_empty());
    assert_eq!(h.issuance.create_calls(), 0);
    assert!(h.invoicing.mirrored().is_empty());
    assert!(!h.guard.is_marked(&abc123()));
}

#[tokio::test]
async fn missing_cart_link_is_a_client_error_until_fixed() {
    let h = Harness::new();
    h.invoicing.set_settlement_code("abc123", "paid");

    let err = h.finalizer.poll(&abc123()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::LinkageMissing { .. }));
    assert!(err.is_client_error());
    assert!(!h.guard.is_marked(&abc123()));
    assert_eq!(h.guard.acquire_calls(), 0);

    h.carts.link("abc123", "cart-789");
    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
}

#[tokio::test]
async fn completion_failure_releases_lock_and_stays_retriable() {
    let h = Harness::new().paid_and_linked();
    h.issuance.set_complete_failing(true);

    let err = h.finalizer.poll(&abc123()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Upstream { service: "issuance", .. }));
    assert!(!err.is_client_error());
    assert!(!h.guard.is_marked(&abc123()));
    assert_eq!(h.notifications.sent().len(), 0);

    // Lock was released
    assert!(h.guard.acquire_lock(&abc123()).await.unwrap());
    h.guard.release_lock(&abc123()).await.unwrap();
}

#[tokio::test]
async fn retry_after_completion_failure_reuses_recorded_purchase() {
    let h = Harness::new().paid_and_linked();
    h.issuance.set_complete_failing(true);
    h.finalizer.poll(&abc123()).await.unwrap_err();

    let recorded = h.ledger.recorded_attempt(&abc123()).await.unwrap().unwrap();

    h.issuance.set_complete_failing(false);
    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
    assert_eq!(outcome.purchase, Some(recorded));
    assert_eq!(h.issuance.create_calls(), 1);
    assert_eq!(h.issuance.complete_calls(), 2);
}

#[tokio::test]
async fn panic_during_finalization_still_releases_lock() {
    let h = Harness::new().paid_and_linked();
    h.issuance.set_complete_panicking(true);

    let err = h.finalizer.poll(&abc123()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Aborted(_)));
    assert!(!h.guard.is_locked(&abc123()));
    assert!(!h.guard.is_marked(&abc123()));
}

#[tokio::test]
async fn dropped_poll_releases_lock_while_create_in_flight() {
    let h = Harness::new().paid_and_linked();
    h.issuance.set_create_delay(Duration::from_millis(500));

    let finalizer = Arc::clone(&h.finalizer);
    let poll = tokio::spawn(async move { finalizer.poll(&abc123()).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.guard.is_locked(&abc123()));
    assert_eq!(h.issuance.create_calls(), 1);

    poll.abort();
    assert!(poll.await.unwrap_err().is_cancelled());

    // Release runs on a spawned task
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!h.guard.is_locked(&abc123()));
    assert!(!h.guard.is_marked(&abc123()));
    assert_eq!(h.guard.release_calls(), 1);

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
    assert_eq!(h.issuance.create_calls(), 2);
}

#[tokio::test]
async fn cart_store_failure_on_paid_invoice_is_a_server_error() {
    let h = Harness::new().paid_and_linked();
    h.carts.set_failing(true);

    let err = h.finalizer.poll(&abc123()).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Store(_)));
    assert!(!err.is_client_error());
    assert!(!h.guard.is_marked(&abc123()));
    assert_eq!(h.guard.acquire_calls(), 0);
    assert_eq!(h.issuance.create_calls(), 0);

    h.carts.set_failing(false);
    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
}

#[tokio::test]
async fn incomplete_purchase_sends_failure_notice() {
    let h = Harness::new().paid_and_linked();
    h.issuance.set_completion(Some("pending"), Some("failed"));

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
    assert_eq!(outcome.is_completed_purchase, Some(false));
    assert!(outcome.message.is_some());
    assert_eq!(h.notifications.success_calls(), 0);
    assert_eq!(h.notifications.failure_calls(), 1);
    assert!(outcome.effects.attempted(EffectKind::FailureNotice));
    assert!(h.guard.is_marked(&abc123()));
}

#[tokio::test]
async fn failing_side_effects_do_not_block_confirmation() {
    let h = Harness::new().paid_and_linked();
    h.invoicing.set_mirror_ignored(true);
    h.notifications.set_failing(true);
    h.counters.set_failing(true);

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::Confirmed);
    assert_eq!(outcome.effects.outcomes().len(), 3);
    assert_eq!(outcome.effects.failures().count(), 3);
    assert!(h.guard.is_marked(&abc123()));
}

// ============================================================================
// Unpaid paths
// ============================================================================

#[tokio::test]
async fn pending_never_touches_the_lock() {
    let h = Harness::new();
    h.carts.link("abc123", "cart-789");
    h.invoicing.set_settlement_code("abc123", "in_payment");

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::PaymentProcessing);
    assert_eq!(h.guard.acquire_calls(), 0);
    assert!(!h.guard.is_marked(&abc123()));
    assert_eq!(
        h.invoicing.mirrored()[0].1.status,
        MirrorStatus::PaymentProcessing
    );
}

#[tokio::test]
async fn pending_then_cancelled_then_already_processed() {
    let h = Harness::new();
    h.carts.link("abc123", "cart-789");

    h.invoicing.set_settlement_code("abc123", "pending");
    let first = h.finalizer.poll(&abc123()).await.unwrap();

    h.invoicing.set_settlement_code("abc123", "cancelled");
    let second = h.finalizer.poll(&abc123()).await.unwrap();
    let third = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(first.status, PollStatus::PaymentProcessing);
    assert_eq!(second.status, PollStatus::Cancelled);
    assert_eq!(third.status, PollStatus::AlreadyProcessed);
    assert!(h.guard.is_marked(&abc123()));
    assert_eq!(h.guard.acquire_calls(), 0);
    // Third poll short-circuits before the provider
    assert_eq!(h.invoicing.search_calls(), 2);
}

#[tokio::test]
async fn missing_invoice_records_nothing() {
    let h = Harness::new();

    let outcome = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(outcome.status, PollStatus::NotFound);
    assert!(outcome.effects.is_empty());
    assert!(!h.guard.is_marked(&abc123()));
}

// ============================================================================
// Guard degradation
// ============================================================================

#[tokio::test]
async fn store_outage_is_absorbed_by_fallback_guard() {
    let primary = MockIdempotencyGuard::new();
    primary.fail_with_store_error(true);
    let wired = FallbackIdempotencyGuard::new(
        Arc::new(primary.clone()),
        InMemoryIdempotencyGuard::new(GuardSettings::default()),
    );
    let h = Harness::with_guard(primary, Arc::new(wired)).paid_and_linked();

    let first = h.finalizer.poll(&abc123()).await.unwrap();
    let second = h.finalizer.poll(&abc123()).await.unwrap();

    assert_eq!(first.status, PollStatus::Confirmed);
    assert_eq!(second.status, PollStatus::AlreadyProcessed);
    assert_eq!(h.issuance.create_calls(), 1);
    // Nothing reached the unavailable store
    assert!(!h.guard.is_marked(&abc123()));
}
