//! Error types for reconciliation and finalization.

use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Failures that can surface from a poll.
///
/// Intermediate conditions (invoice not yet recorded, lock held elsewhere)
/// are statuses, not errors. Side-effect failures never reach this type;
/// they are captured in [`crate::effects::EffectOutcome`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    // ═══════════════════════════════════════════════════════════
    // Client errors (400-class)
    // ═══════════════════════════════════════════════════════════

    /// Payment reference is missing or malformed.
    #[error("Invalid payment reference: {0}")]
    Validation(String),

    /// Invoice is paid but no cart is linked to the reference.
    ///
    /// Operator-actionable. The reference is not marked processed, so a
    /// later poll succeeds once the linkage is fixed.
    #[error("Payment {reference} is paid but no cart is linked to it")]
    LinkageMissing {
        /// Payment reference that could not be resolved
        reference: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Server errors (500-class)
    // ═══════════════════════════════════════════════════════════

    /// Invoicing provider, issuance system or purchase ledger call failed.
    #[error("{service} call failed: {message}")]
    Upstream {
        /// Collaborator that failed
        service: &'static str,
        /// Failure detail (logged, never shown to clients)
        message: String,
    },

    /// Lock or processed-marker store failed.
    #[error("Idempotency store error: {0}")]
    Store(String),

    /// Finalization aborted unexpectedly (panic inside the locked section).
    #[error("Finalization aborted: {0}")]
    Aborted(String),
}

impl ReconcileError {
    /// Build an [`ReconcileError::Upstream`] from any displayable error.
    pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            service,
            message: err.to_string(),
        }
    }

    /// Whether the caller is at fault (400-class) rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::LinkageMissing { .. })
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REFERENCE",
            Self::LinkageMissing { .. } => "LINKAGE_MISSING",
            Self::Upstream { .. } => "UPSTREAM_FAILURE",
            Self::Store(_) => "STORE_FAILURE",
            Self::Aborted(_) => "FINALIZATION_ABORTED",
        }
    }
}

impl From<redis::RedisError> for ReconcileError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
