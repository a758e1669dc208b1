//! Mock collaborator implementations for testing.
//!
//! Every mock is cheap to clone and clones share state, so a test can keep a
//! handle for assertions while the finalizer owns another. Each mock counts
//! its calls and supports failure injection.
//!
//! The purchase-attempt ledger has no mock: use
//! [`crate::stores::InMemoryPurchaseLedger`].

pub mod cart;
pub mod counter;
pub mod guard;
pub mod invoicing;
pub mod issuance;
pub mod notification;

pub use cart::MockCartResolver;
pub use counter::MockCounterStore;
pub use guard::MockIdempotencyGuard;
pub use invoicing::MockInvoicingProvider;
pub use issuance::MockIssuanceSystem;
pub use notification::{MockNotificationDispatch, SentNotification};
