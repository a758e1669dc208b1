//! Mock notification dispatch for testing.

use crate::error::{ReconcileError, Result};
use crate::providers::{NotificationDispatch, TicketNotice};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A notification the mock was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    /// Issued ticket
    Success(TicketNotice),
    /// Issuance failure notice with its reason
    Failure(TicketNotice, String),
}

/// Mock notification dispatch that records every call.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationDispatch {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    fail: Arc<AtomicBool>,
}

impl MockNotificationDispatch {
    /// Create a dispatcher that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail (the call is still recorded).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All recorded calls, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of success-ticket calls.
    #[must_use]
    pub fn success_calls(&self) -> usize {
        self.sent()
            .iter()
            .filter(|n| matches!(n, SentNotification::Success(_)))
            .count()
    }

    /// Number of failure-notice calls.
    #[must_use]
    pub fn failure_calls(&self) -> usize {
        self.sent()
            .iter()
            .filter(|n| matches!(n, SentNotification::Failure(..)))
            .count()
    }

    fn record(&self, notification: SentNotification) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);

        if self.fail.load(Ordering::SeqCst) {
            return Err(ReconcileError::upstream(
                "notifications",
                "mock notification failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatch for MockNotificationDispatch {
    async fn send_success_ticket(&self, notice: &TicketNotice) -> Result<()> {
        self.record(SentNotification::Success(notice.clone()))
    }

    async fn send_failure_notice(&self, notice: &TicketNotice, reason: &str) -> Result<()> {
        self.record(SentNotification::Failure(notice.clone(), reason.to_string()))
    }
}
