//! Collaborator interfaces.
//!
//! This module defines traits for every external dependency the finalizer
//! touches. The finalizer only sees these traits; the runtime wires in
//! concrete implementations.
//!
//! ```text
//!                    ┌────────────────────┐
//!  GET /poll/{ref} ─▶│  BookingFinalizer  │
//!                    └─────────┬──────────┘
//!        ┌──────────────┬──────┴───────┬───────────────┐
//!        ▼              ▼              ▼               ▼
//!  InvoicingProvider  IdempotencyGuard IssuanceSystem  SideEffectDispatcher
//!  CartResolver       PurchaseLedger                   ├─ NotificationDispatch
//!                                                      └─ CounterStore
//! ```
//!
//! This enables:
//! - **Testing**: mocks from `crate::mocks` (feature `test-utils`) with call counters and failure injection
//! - **Production**: Redis-backed stores and HTTP clients
//! - **Single-instance deployments**: in-memory guard and ledger

pub mod cart;
pub mod counter;
pub mod guard;
pub mod invoicing;
pub mod issuance;
pub mod ledger;
pub mod notification;

pub use cart::CartResolver;
pub use counter::CounterStore;
pub use guard::{GuardSettings, IdempotencyGuard};
pub use invoicing::{BookingStatusUpdate, Invoice, InvoicingProvider, MirrorResult};
pub use issuance::{
    CompletedPurchase, CompletionContext, IssuanceSystem, PurchaseOptions, PurchaseRecord,
};
pub use ledger::PurchaseLedger;
pub use notification::{NotificationDispatch, TicketNotice};
