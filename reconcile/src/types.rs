//! Domain types for payment reconciliation.
//!
//! Value objects shared by the poller, the idempotency guard, the finalizer
//! and the HTTP shell.

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque reference correlating one booking, one invoice and one purchase.
///
/// Between 1 and [`PaymentReference::MAX_LEN`] characters, with no whitespace
/// or control characters. The value is used verbatim in store keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    /// Maximum accepted length in characters.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a raw reference.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] if the reference is empty, longer
    /// than [`Self::MAX_LEN`] characters, or contains whitespace or control
    /// characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(ReconcileError::Validation(
                "reference must not be empty".to_string(),
            ));
        }

        let len = raw.chars().count();
        if len > Self::MAX_LEN {
            return Err(ReconcileError::Validation(format!(
                "reference must be at most {} characters, got {len}",
                Self::MAX_LEN
            )));
        }

        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ReconcileError::Validation(
                "reference must not contain whitespace or control characters".to_string(),
            ));
        }

        Ok(Self(raw))
    }

    /// Borrow the raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PaymentReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cart identifier in the issuance system.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(String);

impl CartId {
    /// Wrap a cart identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Settlement state
// ============================================================================

/// Canonical settlement state of an invoice.
///
/// Derived on every poll from the provider's raw settlement code. Codes the
/// table does not know map to [`ExternalInvoiceState::Unknown`] and carry
/// the raw value, so a new provider code can never be mistaken for a known
/// state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalInvoiceState {
    /// Payment settled
    Paid,
    /// Payment in flight
    Pending,
    /// Invoice cancelled
    Cancelled,
    /// Payment failed or reversed
    Failed,
    /// Unrecognized provider code
    Unknown(String),
}

impl ExternalInvoiceState {
    /// Map a raw provider settlement code.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    #[must_use]
    pub fn from_raw_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "paid" | "done" => Self::Paid,
            "in_payment" | "pending" => Self::Pending,
            "cancel" | "cancelled" => Self::Cancelled,
            "failed" | "reversed" => Self::Failed,
            _ => Self::Unknown(code.to_string()),
        }
    }
}

impl fmt::Display for ExternalInvoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paid => f.write_str("paid"),
            Self::Pending => f.write_str("pending"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Failed => f.write_str("failed"),
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

// ============================================================================
// Statuses
// ============================================================================

/// Status returned to the poll caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PollStatus {
    /// Reference was already finalized within the retention window
    AlreadyProcessed,
    /// No invoice recorded upstream yet; retry later
    NotFound,
    /// Payment in flight, or another instance is finalizing
    PaymentProcessing,
    /// Invoice cancelled (terminal)
    Cancelled,
    /// Payment failed (terminal)
    PaymentFailed,
    /// Ticket issued (terminal success)
    Confirmed,
    /// Provider returned an unrecognized settlement code
    Unknown,
}

impl PollStatus {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyProcessed => "alreadyProcessed",
            Self::NotFound => "notFound",
            Self::PaymentProcessing => "paymentProcessing",
            Self::Cancelled => "cancelled",
            Self::PaymentFailed => "paymentFailed",
            Self::Confirmed => "confirmed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking status mirrored to the invoicing provider for human visibility.
///
/// Never authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorStatus {
    /// Ticket issued
    Confirmed,
    /// Payment in flight
    PaymentProcessing,
    /// Booking cancelled
    Cancelled,
    /// Payment failed
    PaymentFailed,
}

impl MirrorStatus {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::PaymentProcessing => "payment_processing",
            Self::Cancelled => "cancelled",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

impl fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
