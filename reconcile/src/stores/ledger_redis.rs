//! Redis-backed purchase-attempt ledger.
//!
//! Key: `{prefix}:purchase:{reference}` → JSON [`PurchaseRecord`], kept for
//! the configured retention (longer than the processed marker so a late
//! retry still finds the record).

use crate::error::{ReconcileError, Result};
use crate::providers::{PurchaseLedger, PurchaseRecord};
use crate::types::PaymentReference;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Purchase-attempt ledger on `Redis`.
#[derive(Clone)]
pub struct RedisPurchaseLedger {
    conn_manager: ConnectionManager,
    retention: Duration,
    key_prefix: String,
}

impl RedisPurchaseLedger {
    /// Create a ledger on an existing connection.
    #[must_use]
    pub fn new(
        conn_manager: ConnectionManager,
        retention: Duration,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn_manager,
            retention,
            key_prefix: key_prefix.into(),
        }
    }

    fn purchase_key(&self, reference: &PaymentReference) -> String {
        format!("{}:purchase:{reference}", self.key_prefix)
    }
}

#[async_trait]
impl PurchaseLedger for RedisPurchaseLedger {
    async fn recorded_attempt(
        &self,
        reference: &PaymentReference,
    ) -> Result<Option<PurchaseRecord>> {
        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = conn.get(self.purchase_key(reference)).await?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                ReconcileError::Store(format!("Corrupt purchase ledger entry: {e}"))
            })
        })
        .transpose()
    }

    async fn record_attempt(
        &self,
        reference: &PaymentReference,
        purchase: PurchaseRecord,
    ) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let json = serde_json::to_string(&purchase)
            .map_err(|e| ReconcileError::Store(format!("Serialization error: {e}")))?;

        let _: () = conn
            .set_ex(
                self.purchase_key(reference),
                json,
                self.retention.as_secs().max(1),
            )
            .await?;

        tracing::debug!(
            reference = %reference,
            purchase_id = purchase.id,
            "Purchase attempt recorded"
        );

        Ok(())
    }
}
