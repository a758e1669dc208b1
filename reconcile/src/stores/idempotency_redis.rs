//! Redis-backed idempotency guard.
//!
//! # Keys
//!
//! - `{prefix}:lock:{reference}` → owner token, `PX` = lock lease
//! - `{prefix}:processed:{reference}` → RFC 3339 timestamp, `EX` = retention
//!
//! # Lock semantics
//!
//! Acquisition is a single `SET key owner NX PX ttl`. Release runs a Lua
//! compare-and-delete so a holder whose lease already expired cannot delete
//! the lock of the next holder.
//!
//! Every guard instance has its own owner token. Two requests in the same
//! process share it, which is fine: the second `SET NX` fails regardless of
//! the token.

use crate::error::Result;
use crate::providers::{GuardSettings, IdempotencyGuard};
use crate::types::PaymentReference;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Distributed lock and processed-marker cache on `Redis`.
#[derive(Clone)]
pub struct RedisIdempotencyGuard {
    conn_manager: ConnectionManager,
    settings: GuardSettings,
    key_prefix: String,
    owner: String,
}

impl RedisIdempotencyGuard {
    /// Create a guard on an existing connection.
    #[must_use]
    pub fn new(
        conn_manager: ConnectionManager,
        settings: GuardSettings,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn_manager,
            settings,
            key_prefix: key_prefix.into(),
            owner: Uuid::new_v4().to_string(),
        }
    }

    fn lock_key(&self, reference: &PaymentReference) -> String {
        format!("{}:lock:{reference}", self.key_prefix)
    }

    fn processed_key(&self, reference: &PaymentReference) -> String {
        format!("{}:processed:{reference}", self.key_prefix)
    }
}

#[async_trait]
impl IdempotencyGuard for RedisIdempotencyGuard {
    async fn is_processed(&self, reference: &PaymentReference) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let exists: bool = conn.exists(self.processed_key(reference)).await?;
        Ok(exists)
    }

    async fn mark_processed(&self, reference: &PaymentReference) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let retention = self.settings.processed_retention.as_secs().max(1);

        let _: () = conn
            .set_ex(
                self.processed_key(reference),
                Utc::now().to_rfc3339(),
                retention,
            )
            .await?;

        tracing::debug!(
            reference = %reference,
            retention_secs = retention,
            "Processed marker set"
        );

        Ok(())
    }

    async fn acquire_lock(&self, reference: &PaymentReference) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        #[allow(clippy::cast_possible_truncation)] // Leases are minutes, not millennia
        let lease_ms = (self.settings.lock_ttl.as_millis() as u64).max(1);

        // SET NX replies OK when the key was set and nil when it already exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.lock_key(reference))
            .arg(&self.owner)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await?;

        let acquired = reply.is_some();
        tracing::debug!(reference = %reference, acquired, lease_ms, "Lock acquisition");

        Ok(acquired)
    }

    async fn release_lock(&self, reference: &PaymentReference) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let deleted: i32 = Script::new(RELEASE_SCRIPT)
            .key(self.lock_key(reference))
            .arg(&self.owner)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            tracing::warn!(
                reference = %reference,
                "Lock was not held by this guard at release (lease expired?)"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use crate::stores::connect;
    use std::time::Duration;

    async fn guard(settings: GuardSettings) -> RedisIdempotencyGuard {
        let conn = connect("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        RedisIdempotencyGuard::new(conn, settings, format!("test:{}", Uuid::new_v4()))
    }

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn test_lock_is_exclusive_across_guards() {
        let first = guard(GuardSettings::default()).await;
        let second = RedisIdempotencyGuard {
            owner: Uuid::new_v4().to_string(),
            ..first.clone()
        };
        let reference = PaymentReference::parse("lock-exclusive").unwrap();

        assert!(first.acquire_lock(&reference).await.unwrap());
        assert!(!second.acquire_lock(&reference).await.unwrap());

        // A foreign release must not free the lock
        second.release_lock(&reference).await.unwrap();
        assert!(!second.acquire_lock(&reference).await.unwrap());

        first.release_lock(&reference).await.unwrap();
        assert!(second.acquire_lock(&reference).await.unwrap());
        second.release_lock(&reference).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_lock_lease_expires() {
        let guard = guard(GuardSettings {
            lock_ttl: Duration::from_millis(200),
            ..GuardSettings::default()
        })
        .await;
        let reference = PaymentReference::parse("lock-expiry").unwrap();

        assert!(guard.acquire_lock(&reference).await.unwrap());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(guard.acquire_lock(&reference).await.unwrap());
        guard.release_lock(&reference).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_processed_marker() {
        let guard = guard(GuardSettings::default()).await;
        let reference = PaymentReference::parse("marker").unwrap();

        assert!(!guard.is_processed(&reference).await.unwrap());
        guard.mark_processed(&reference).await.unwrap();
        assert!(guard.is_processed(&reference).await.unwrap());
    }
}
