//! Redis-backed issued-ticket counters.
//!
//! Keys:
//! - `{prefix}:tickets:issued:total`: all-time count
//! - `{prefix}:tickets:issued:{YYYY-MM-DD}`: per UTC day, expires after 90 days

use crate::error::Result;
use crate::providers::CounterStore;
use crate::types::PaymentReference;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

const DAILY_COUNTER_TTL_SECS: i64 = 90 * 24 * 60 * 60;

/// Issued-ticket counters on `Redis`.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisCounterStore {
    /// Create a counter store on an existing connection.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn_manager,
            key_prefix: key_prefix.into(),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_issued_ticket_counters(&self, reference: &PaymentReference) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let total_key = format!("{}:tickets:issued:total", self.key_prefix);
        let daily_key = format!(
            "{}:tickets:issued:{}",
            self.key_prefix,
            Utc::now().format("%Y-%m-%d")
        );

        let (total, today): (u64, u64) = redis::pipe()
            .atomic()
            .incr(&total_key, 1)
            .incr(&daily_key, 1)
            .expire(&daily_key, DAILY_COUNTER_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(
            reference = %reference,
            total,
            today,
            "Issued ticket counters incremented"
        );

        Ok(())
    }
}
