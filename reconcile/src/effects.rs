//! Side-effect dispatcher.
//!
//! Status mirrors, customer notifications and counter increments are extras
//! around the canonical reference → purchase transition. Each one runs on its
//! own, bounded by a timeout, and comes back as an [`EffectOutcome`] instead
//! of an error. The finalizer collects them into an [`EffectReport`].
//!
//! One attempt per effect per finalization pass. There is no retry queue.

use crate::metrics;
use crate::providers::{
    BookingStatusUpdate, CounterStore, InvoicingProvider, MirrorResult, NotificationDispatch,
    TicketNotice,
};
use crate::types::{CartId, PaymentReference};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound for a single effect.
pub const DEFAULT_EFFECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Which side effect ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Booking status copied to the invoicing provider
    StatusMirror,
    /// Issued ticket sent to the customer
    SuccessNotification,
    /// Customer told that issuance did not complete
    FailureNotice,
    /// Issued-ticket counters incremented
    CounterIncrement,
}

impl EffectKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusMirror => "status_mirror",
            Self::SuccessNotification => "success_notification",
            Self::FailureNotice => "failure_notice",
            Self::CounterIncrement => "counter_increment",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectOutcome {
    /// Which effect ran
    pub kind: EffectKind,
    /// `Err` carries the failure detail (logged, never surfaced)
    pub result: Result<(), String>,
}

impl EffectOutcome {
    /// Whether the effect succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of every side effect attempted in one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectReport {
    outcomes: Vec<EffectOutcome>,
}

impl EffectReport {
    /// Empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }

    /// Append an outcome.
    pub fn push(&mut self, outcome: EffectOutcome) {
        self.outcomes.push(outcome);
    }

    /// All outcomes, in execution order.
    #[must_use]
    pub fn outcomes(&self) -> &[EffectOutcome] {
        &self.outcomes
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &EffectOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Whether an effect of this kind was attempted.
    #[must_use]
    pub fn attempted(&self, kind: EffectKind) -> bool {
        self.outcomes.iter().any(|o| o.kind == kind)
    }

    /// Whether nothing was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Runs best-effort side effects.
#[derive(Clone)]
pub struct SideEffectDispatcher {
    invoicing: Arc<dyn InvoicingProvider>,
    notifications: Arc<dyn NotificationDispatch>,
    counters: Arc<dyn CounterStore>,
    timeout: Duration,
}

impl SideEffectDispatcher {
    /// Create a dispatcher with the default per-effect timeout.
    #[must_use]
    pub fn new(
        invoicing: Arc<dyn InvoicingProvider>,
        notifications: Arc<dyn NotificationDispatch>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            invoicing,
            notifications,
            counters,
            timeout: DEFAULT_EFFECT_TIMEOUT,
        }
    }

    /// Override the per-effect timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Copy a booking status onto the invoicing provider.
    ///
    /// An update the provider ignores counts as a failed effect.
    pub async fn mirror_status(
        &self,
        cart_id: &CartId,
        update: BookingStatusUpdate,
    ) -> EffectOutcome {
        let reference = update.payment_reference.clone();
        let status = update.status;

        self.run(EffectKind::StatusMirror, &reference, async {
            match self.invoicing.update_booking_status(cart_id, update).await {
                MirrorResult::Applied => Ok(()),
                MirrorResult::Ignored { reason } => {
                    Err(format!("provider ignored {status} for cart {cart_id}: {reason}"))
                }
            }
        })
        .await
    }

    /// Send the issued ticket.
    pub async fn notify_success(&self, notice: &TicketNotice) -> EffectOutcome {
        self.run(
            EffectKind::SuccessNotification,
            &notice.payment_reference,
            async {
                self.notifications
                    .send_success_ticket(notice)
                    .await
                    .map_err(|e| e.to_string())
            },
        )
        .await
    }

    /// Tell the customer issuance did not complete.
    pub async fn notify_failure(&self, notice: &TicketNotice, reason: &str) -> EffectOutcome {
        self.run(EffectKind::FailureNotice, &notice.payment_reference, async {
            self.notifications
                .send_failure_notice(notice, reason)
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    /// Count one more issued booking.
    pub async fn increment_counters(&self, reference: &PaymentReference) -> EffectOutcome {
        self.run(EffectKind::CounterIncrement, reference, async {
            self.counters
                .increment_issued_ticket_counters(reference)
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn run<F>(&self, kind: EffectKind, reference: &PaymentReference, effect: F) -> EffectOutcome
    where
        F: Future<Output = Result<(), String>> + Send,
    {
        let result = match tokio::time::timeout(self.timeout, effect).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {} ms", self.timeout.as_millis())),
        };

        match &result {
            Ok(()) => tracing::info!(reference = %reference, effect = %kind, "Side effect completed"),
            Err(error) => tracing::warn!(
                reference = %reference,
                effect = %kind,
                error = %error,
                "Side effect failed"
            ),
        }
        metrics::record_side_effect(kind.as_str(), result.is_ok());

        EffectOutcome { kind, result }
    }
}
