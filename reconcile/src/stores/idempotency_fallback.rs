//! Idempotency guard that degrades to process memory.
//!
//! Wraps a distributed guard. When a call fails with a store error the call
//! is served by an [`InMemoryIdempotencyGuard`] instead, with a `warn` log
//! and a `reconcile_guard_fallback_total` increment.
//!
//! # Reduced guarantee
//!
//! While degraded, mutual exclusion only holds inside this process. That is
//! correct for a single-instance deployment and NOT a substitute for the
//! distributed lock when several instances serve polls.
//!
//! # Consistency rules
//!
//! - Every lock held by this process is also recorded in memory, so a
//!   degraded-mode holder and a recovered-mode holder in the same process
//!   still exclude each other.
//! - Release always clears memory, and clears the primary when reachable.
//! - A reference counts as processed if either store says so, so markers
//!   written during an outage are still honored after recovery.

use crate::error::{ReconcileError, Result};
use crate::metrics;
use crate::providers::IdempotencyGuard;
use crate::stores::InMemoryIdempotencyGuard;
use crate::types::PaymentReference;
use async_trait::async_trait;
use std::sync::Arc;

/// Distributed guard with an in-memory fallback.
#[derive(Clone)]
pub struct FallbackIdempotencyGuard {
    primary: Arc<dyn IdempotencyGuard>,
    fallback: InMemoryIdempotencyGuard,
}

impl FallbackIdempotencyGuard {
    /// Wrap `primary`, degrading to `fallback` on store errors.
    #[must_use]
    pub fn new(primary: Arc<dyn IdempotencyGuard>, fallback: InMemoryIdempotencyGuard) -> Self {
        Self { primary, fallback }
    }

    fn degrade(operation: &'static str, reference: &PaymentReference, err: &ReconcileError) {
        tracing::warn!(
            reference = %reference,
            operation,
            error = %err,
            "Idempotency store unavailable, using in-process fallback (single-instance guarantee only)"
        );
        metrics::record_guard_fallback(operation);
    }
}

#[async_trait]
impl IdempotencyGuard for FallbackIdempotencyGuard {
    async fn is_processed(&self, reference: &PaymentReference) -> Result<bool> {
        if self.fallback.is_processed(reference).await? {
            return Ok(true);
        }

        match self.primary.is_processed(reference).await {
            Ok(processed) => Ok(processed),
            Err(err @ ReconcileError::Store(_)) => {
                Self::degrade("is_processed", reference, &err);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn mark_processed(&self, reference: &PaymentReference) -> Result<()> {
        match self.primary.mark_processed(reference).await {
            Ok(()) => Ok(()),
            Err(err @ ReconcileError::Store(_)) => {
                Self::degrade("mark_processed", reference, &err);
                self.fallback.mark_processed(reference).await
            }
            Err(err) => Err(err),
        }
    }

    async fn acquire_lock(&self, reference: &PaymentReference) -> Result<bool> {
        match self.primary.acquire_lock(reference).await {
            Ok(false) => Ok(false),
            Ok(true) => {
                if self.fallback.acquire_lock(reference).await? {
                    Ok(true)
                } else {
                    // A degraded-mode holder in this process is still running
                    tracing::debug!(
                        reference = %reference,
                        "Lock held in process memory, backing out of distributed lock"
                    );
                    self.primary.release_lock(reference).await?;
                    Ok(false)
                }
            }
            Err(err @ ReconcileError::Store(_)) => {
                Self::degrade("acquire_lock", reference, &err);
                self.fallback.acquire_lock(reference).await
            }
            Err(err) => Err(err),
        }
    }

    async fn release_lock(&self, reference: &PaymentReference) -> Result<()> {
        self.fallback.release_lock(reference).await?;

        match self.primary.release_lock(reference).await {
            Ok(()) => Ok(()),
            Err(err @ ReconcileError::Store(_)) => {
                Self::degrade("release_lock", reference, &err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::mocks::MockIdempotencyGuard;
    use crate::providers::GuardSettings;

    fn reference(raw: &str) -> PaymentReference {
        PaymentReference::parse(raw).unwrap()
    }

    fn guard(primary: &MockIdempotencyGuard) -> FallbackIdempotencyGuard {
        FallbackIdempotencyGuard::new(
            Arc::new(primary.clone()),
            InMemoryIdempotencyGuard::new(GuardSettings::default()),
        )
    }

    #[tokio::test]
    async fn test_healthy_primary_is_authoritative() {
        let primary = MockIdempotencyGuard::new();
        let guard = guard(&primary);
        let r = reference("abc123");

        assert!(guard.acquire_lock(&r).await.unwrap());
        assert!(!guard.acquire_lock(&r).await.unwrap());
        guard.release_lock(&r).await.unwrap();

        guard.mark_processed(&r).await.unwrap();
        assert!(primary.is_marked(&r));
        assert!(guard.is_processed(&r).await.unwrap());
    }

    #[tokio::test]
    async fn test_outage_degrades_to_memory() {
        let primary = MockIdempotencyGuard::new();
        primary.fail_with_store_error(true);
        let guard = guard(&primary);
        let r = reference("abc123");

        // Lock still excludes within the process
        assert!(guard.acquire_lock(&r).await.unwrap());
        assert!(!guard.acquire_lock(&r).await.unwrap());
        guard.release_lock(&r).await.unwrap();
        assert!(guard.acquire_lock(&r).await.unwrap());
        guard.release_lock(&r).await.unwrap();

        // Marker lands in memory
        assert!(!guard.is_processed(&r).await.unwrap());
        guard.mark_processed(&r).await.unwrap();
        assert!(guard.is_processed(&r).await.unwrap());
    }

    #[tokio::test]
    async fn test_outage_marker_survives_recovery() {
        let primary = MockIdempotencyGuard::new();
        let guard = guard(&primary);
        let r = reference("abc123");

        primary.fail_with_store_error(true);
        guard.mark_processed(&r).await.unwrap();

        primary.fail_with_store_error(false);
        assert!(!primary.is_marked(&r));
        assert!(guard.is_processed(&r).await.unwrap());
    }

    #[tokio::test]
    async fn test_degraded_holder_blocks_recovered_acquire() {
        let primary = MockIdempotencyGuard::new();
        let guard = guard(&primary);
        let r = reference("abc123");

        primary.fail_with_store_error(true);
        assert!(guard.acquire_lock(&r).await.unwrap());

        primary.fail_with_store_error(false);
        assert!(!guard.acquire_lock(&r).await.unwrap());
        // The distributed lock taken during the probe was handed back
        assert!(!primary.is_locked(&r));

        guard.release_lock(&r).await.unwrap();
        assert!(guard.acquire_lock(&r).await.unwrap());
    }
}
