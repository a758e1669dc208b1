//! Mock ticket issuance system for testing.

use crate::error::{ReconcileError, Result};
use crate::providers::{
    CompletedPurchase, CompletionContext, IssuanceSystem, PurchaseOptions, PurchaseRecord,
};
use crate::types::CartId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Behavior {
    create_delay: Option<Duration>,
    completion_status: Option<String>,
    completion_poll_outcome: Option<String>,
}

/// Mock issuance system.
///
/// Purchases get sequential ids starting at 1000 and random UUIDs. Completion
/// reports `booked` / `completed` unless reconfigured.
#[derive(Debug, Clone)]
pub struct MockIssuanceSystem {
    next_id: Arc<AtomicU64>,
    create_calls: Arc<AtomicUsize>,
    complete_calls: Arc<AtomicUsize>,
    fail_create: Arc<AtomicBool>,
    fail_complete: Arc<AtomicBool>,
    panic_on_complete: Arc<AtomicBool>,
    created: Arc<Mutex<Vec<(CartId, PurchaseOptions)>>>,
    completions: Arc<Mutex<Vec<(PurchaseRecord, CompletionContext)>>>,
    behavior: Arc<Mutex<Behavior>>,
}

impl Default for MockIssuanceSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIssuanceSystem {
    /// Create an issuance system that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1000)),
            create_calls: Arc::new(AtomicUsize::new(0)),
            complete_calls: Arc::new(AtomicUsize::new(0)),
            fail_create: Arc::new(AtomicBool::new(false)),
            fail_complete: Arc::new(AtomicBool::new(false)),
            panic_on_complete: Arc::new(AtomicBool::new(false)),
            created: Arc::new(Mutex::new(Vec::new())),
            completions: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(Behavior {
                create_delay: None,
                completion_status: Some("booked".to_string()),
                completion_poll_outcome: Some("completed".to_string()),
            })),
        }
    }

    fn behavior(&self) -> std::sync::MutexGuard<'_, Behavior> {
        self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold every create call for `delay` (widens race windows).
    pub fn set_create_delay(&self, delay: Duration) {
        self.behavior().create_delay = Some(delay);
    }

    /// Status and poll outcome reported by completion.
    pub fn set_completion(&self, status: Option<&str>, poll_outcome: Option<&str>) {
        let mut behavior = self.behavior();
        behavior.completion_status = status.map(str::to_string);
        behavior.completion_poll_outcome = poll_outcome.map(str::to_string);
    }

    /// Make create calls fail.
    pub fn set_create_failing(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make complete calls fail.
    pub fn set_complete_failing(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::SeqCst);
    }

    /// Make complete calls panic.
    pub fn set_complete_panicking(&self, panic: bool) {
        self.panic_on_complete.store(panic, Ordering::SeqCst);
    }

    /// Number of create calls.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of complete calls.
    #[must_use]
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// Every create call, in order.
    #[must_use]
    pub fn created(&self) -> Vec<(CartId, PurchaseOptions)> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every complete call, in order.
    #[must_use]
    pub fn completions(&self) -> Vec<(PurchaseRecord, CompletionContext)> {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl IssuanceSystem for MockIssuanceSystem {
    async fn create_purchase(
        &self,
        cart_id: &CartId,
        options: PurchaseOptions,
    ) -> Result<PurchaseRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((cart_id.clone(), options));

        let delay = self.behavior().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ReconcileError::upstream("issuance", "mock create failure"));
        }

        Ok(PurchaseRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            uuid: Uuid::new_v4(),
        })
    }

    #[allow(clippy::panic)] // Injected fault
    async fn complete_purchase(
        &self,
        purchase: &PurchaseRecord,
        context: CompletionContext,
    ) -> Result<CompletedPurchase> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*purchase, context));

        if self.panic_on_complete.load(Ordering::SeqCst) {
            panic!("mock issuance system panicked while completing");
        }

        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(ReconcileError::upstream("issuance", "mock complete failure"));
        }

        let (status, poll_outcome) = {
            let behavior = self.behavior();
            (
                behavior.completion_status.clone(),
                behavior.completion_poll_outcome.clone(),
            )
        };

        Ok(CompletedPurchase {
            status,
            poll_outcome,
            purchase: serde_json::json!({ "id": purchase.id, "uuid": purchase.uuid }),
        })
    }
}
