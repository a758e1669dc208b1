//! In-process idempotency guard.
//!
//! Mutex-guarded maps of expiry instants. Locks and markers live only as long
//! as the process: correct for a single-instance deployment, and used by
//! [`super::FallbackIdempotencyGuard`] while `Redis` is unreachable. It does
//! NOT coordinate multiple instances.

use crate::error::Result;
use crate::providers::{GuardSettings, IdempotencyGuard};
use crate::types::PaymentReference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
struct Entries {
    locks: HashMap<String, Instant>,
    processed: HashMap<String, Instant>,
}

/// Single-process lock and processed-marker cache.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyGuard {
    settings: GuardSettings,
    entries: Arc<Mutex<Entries>>,
}

impl InMemoryIdempotencyGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new(settings: GuardSettings) -> Self {
        Self {
            settings,
            entries: Arc::new(Mutex::new(Entries::default())),
        }
    }

    /// Number of live locks (for diagnostics and tests).
    #[must_use]
    pub fn held_locks(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .locks
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }
}

#[async_trait]
impl IdempotencyGuard for InMemoryIdempotencyGuard {
    async fn is_processed(&self, reference: &PaymentReference) -> Result<bool> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .processed
            .get(reference.as_str())
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    async fn mark_processed(&self, reference: &PaymentReference) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.processed.retain(|_, expires_at| *expires_at > now);
        entries.processed.insert(
            reference.as_str().to_string(),
            now + self.settings.processed_retention,
        );

        Ok(())
    }

    async fn acquire_lock(&self, reference: &PaymentReference) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.locks.retain(|_, expires_at| *expires_at > now);
        if entries.locks.contains_key(reference.as_str()) {
            return Ok(false);
        }

        entries
            .locks
            .insert(reference.as_str().to_string(), now + self.settings.lock_ttl);
        Ok(true)
    }

    async fn release_lock(&self, reference: &PaymentReference) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .locks
            .remove(reference.as_str());
        Ok(())
    }
}
