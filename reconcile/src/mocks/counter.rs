//! Mock issued-ticket counter store for testing.

use crate::error::{ReconcileError, Result};
use crate::providers::CounterStore;
use crate::types::PaymentReference;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock counter store.
#[derive(Debug, Clone, Default)]
pub struct MockCounterStore {
    increments: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl MockCounterStore {
    /// Create a counter store that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make increments fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of increment calls, failed ones included.
    #[must_use]
    pub fn increment_calls(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for MockCounterStore {
    async fn increment_issued_ticket_counters(&self, _reference: &PaymentReference) -> Result<()> {
        self.increments.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(ReconcileError::Store("mock counter failure".to_string()));
        }
        Ok(())
    }
}
