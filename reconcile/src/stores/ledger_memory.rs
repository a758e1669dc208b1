//! In-process purchase-attempt ledger (single instance, lost on restart).
//!
//! Entries expire after the configured retention, like the `Redis` ledger's
//! TTL. Expired entries are pruned on write.

use crate::error::Result;
use crate::providers::{PurchaseLedger, PurchaseRecord};
use crate::types::PaymentReference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default retention, matching `LEDGER_RETENTION_SECS`.
pub const DEFAULT_LEDGER_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Purchase-attempt ledger in process memory.
#[derive(Debug, Clone)]
pub struct InMemoryPurchaseLedger {
    retention: Duration,
    attempts: Arc<Mutex<HashMap<String, (PurchaseRecord, Instant)>>>,
}

impl Default for InMemoryPurchaseLedger {
    fn default() -> Self {
        Self::with_retention(DEFAULT_LEDGER_RETENTION)
    }
}

impl InMemoryPurchaseLedger {
    /// Create an empty ledger with the default retention.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger whose entries expire after `retention`.
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            retention,
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    /// Whether no live entry remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PurchaseLedger for InMemoryPurchaseLedger {
    async fn recorded_attempt(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<PurchaseRecord>> {
        let now = Instant::now();
        Ok(self
            .attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference.as_str())
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(purchase, _)| *purchase))
    }

    async fn record_attempt(
        &self,
        reference: &PaymentReference,
        purchase: PurchaseRecord,
    ) -> Result<()> {
        let now = Instant::now();
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);

        attempts.retain(|_, (_, expires_at)| *expires_at > now);
        attempts.insert(
            reference.as_str().to_string(),
            (purchase, now + self.retention),
        );
        Ok(())
    }
}
