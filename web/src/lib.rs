//! HTTP shell for bus booking payment reconciliation.
//!
//! Thin Axum layer over [`bus_booking_reconcile::BookingFinalizer`]:
//!
//! 1. Parse and validate the payment reference from the path
//! 2. Run one reconciliation poll
//! 3. Map the outcome (or error) onto the JSON contract
//!
//! ```ignore
//! use bus_booking_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(Arc::new(finalizer)));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use handlers::poll::PollResponse;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
