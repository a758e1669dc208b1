//! # Bus Booking Payment Reconciliation
//!
//! Given a payment reference, polls the invoicing provider for settlement
//! state and, once the payment is confirmed, converts the reservation hold
//! into an issued ticket exactly once.
//!
//! ## Components
//!
//! - [`poller::InvoiceStatePoller`]: reads invoice state, maps provider codes
//!   onto [`types::ExternalInvoiceState`]
//! - [`providers::IdempotencyGuard`]: processing lock and processed marker
//!   (Redis, in-memory, or Redis with an in-memory fallback)
//! - [`finalizer::BookingFinalizer`]: the state machine driving issuance
//! - [`effects::SideEffectDispatcher`]: best-effort status mirror,
//!   notifications and counters
//!
//! ## Example
//!
//! ```rust,ignore
//! use bus_booking_reconcile::*;
//!
//! let finalizer = BookingFinalizer::new(poller, guard, issuance, ledger, effects);
//!
//! let outcome = finalizer.poll(&PaymentReference::parse("abc123")?).await?;
//! assert_eq!(outcome.status, PollStatus::Confirmed);
//! ```
//!
//! ## Guarantees
//!
//! - At most one paid finalization runs per reference at a time (lease-bound
//!   lock; losers report `paymentProcessing`)
//! - The processed marker is set only after a terminal state is fully handled
//! - Side-effect failures never fail or block the poll

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clients;
pub mod config;
pub mod effects;
pub mod error;
pub mod finalizer;
pub mod metrics;
pub mod poller;
pub mod providers;
pub mod stores;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use config::Config;
pub use effects::{EffectKind, EffectOutcome, EffectReport, SideEffectDispatcher};
pub use error::{ReconcileError, Result};
pub use finalizer::{BookingFinalizer, FinalizationOutcome, PurchaseDefaults};
pub use poller::{CartLink, InvoiceStatePoller, PollObservation};
pub use types::{CartId, ExternalInvoiceState, MirrorStatus, PaymentReference, PollStatus};
