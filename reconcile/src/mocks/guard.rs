//! Mock idempotency guard for testing.

use crate::error::{ReconcileError, Result};
use crate::providers::IdempotencyGuard;
use crate::types::PaymentReference;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct GuardState {
    locks: HashSet<String>,
    processed: HashSet<String>,
}

/// Mock idempotency guard without expiry.
///
/// Counts lock traffic and can simulate a store outage, in which case every
/// call fails with [`ReconcileError::Store`].
#[derive(Debug, Clone, Default)]
pub struct MockIdempotencyGuard {
    state: Arc<Mutex<GuardState>>,
    acquire_calls: Arc<AtomicUsize>,
    release_calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl MockIdempotencyGuard {
    /// Create a healthy, empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store outage.
    pub fn fail_with_store_error(&self, fail: bool) {
        self.unavailable.store(fail, Ordering::SeqCst);
    }

    /// Whether the processed marker is set.
    #[must_use]
    pub fn is_marked(&self, reference: &PaymentReference) -> bool {
        self.state().processed.contains(reference.as_str())
    }

    /// Whether the lock is currently held.
    #[must_use]
    pub fn is_locked(&self, reference: &PaymentReference) -> bool {
        self.state().locks.contains(reference.as_str())
    }

    /// Number of acquire attempts.
    #[must_use]
    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    /// Number of release calls.
    #[must_use]
    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ReconcileError::Store("mock store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdempotencyGuard for MockIdempotencyGuard {
    async fn is_processed(&self, reference: &PaymentReference) -> Result<bool> {
        self.check_available()?;
        Ok(self.is_marked(reference))
    }

    async fn mark_processed(&self, reference: &PaymentReference) -> Result<()> {
        self.check_available()?;
        self.state()
            .processed
            .insert(reference.as_str().to_string());
        Ok(())
    }

    async fn acquire_lock(&self, reference: &PaymentReference) -> Result<bool> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.state().locks.insert(reference.as_str().to_string()))
    }

    async fn release_lock(&self, reference: &PaymentReference) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.state().locks.remove(reference.as_str());
        Ok(())
    }
}
