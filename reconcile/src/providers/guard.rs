//! Idempotency guard interface.
//!
//! Two independent primitives keyed by payment reference:
//!
//! - **Processing lock**: exclusive, TTL-bound lease held for the whole paid
//!   finalization sequence. The TTL is the crash-recovery net: a holder that
//!   dies without releasing blocks the reference for at most one lease.
//! - **Processed marker**: expiring flag set once a terminal state has been
//!   fully handled. Later polls short-circuit on it. After it expires a
//!   duplicate poll is reprocessed.

use crate::error::Result;
use crate::types::PaymentReference;
use async_trait::async_trait;
use std::time::Duration;

/// Lease and retention durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardSettings {
    /// Processing lock lease
    pub lock_ttl: Duration,
    /// Processed marker retention
    pub processed_retention: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(5 * 60),
            processed_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Lock service and processed-marker cache.
#[async_trait]
pub trait IdempotencyGuard: Send + Sync {
    /// Whether the reference carries a live processed marker.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Store`] if the store is unreachable.
    async fn is_processed(&self, reference: &PaymentReference) -> Result<bool>;

    /// Set the processed marker with the configured retention.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Store`] if the store is unreachable.
    async fn mark_processed(&self, reference: &PaymentReference) -> Result<()>;

    /// Try to take the processing lock (set-if-absent with a bounded lease).
    ///
    /// Returns `false` if another holder is active.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Store`] if the store is unreachable.
    async fn acquire_lock(&self, reference: &PaymentReference) -> Result<bool>;

    /// Release a lock taken by this guard.
    ///
    /// Releasing a lock that is not held (or is held by someone else after
    /// lease expiry) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Store`] if the store is unreachable.
    async fn release_lock(&self, reference: &PaymentReference) -> Result<()>;
}
