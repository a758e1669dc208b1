//! Concrete implementations of the storage-backed collaborators.
//!
//! Redis-backed stores share one [`ConnectionManager`] (see [`connect`]).
//! In-memory stores are for single-instance deployments and tests; they do
//! not survive a restart.

pub mod cart_redis;
pub mod counter_redis;
pub mod idempotency_fallback;
pub mod idempotency_memory;
pub mod idempotency_redis;
pub mod ledger_memory;
pub mod ledger_redis;

pub use cart_redis::RedisCartResolver;
pub use counter_redis::RedisCounterStore;
pub use idempotency_fallback::FallbackIdempotencyGuard;
pub use idempotency_memory::InMemoryIdempotencyGuard;
pub use idempotency_redis::RedisIdempotencyGuard;
pub use ledger_memory::InMemoryPurchaseLedger;
pub use ledger_redis::RedisPurchaseLedger;

use crate::error::{ReconcileError, Result};
use redis::Client;
use redis::aio::ConnectionManager;

/// Open a pooled `Redis` connection.
///
/// # Connection URL Format
///
/// - TCP: `redis://[:password@]host[:port][/database]`
/// - TLS: `rediss://[:password@]host[:port][/database]`
///
/// # Errors
///
/// Returns [`ReconcileError::Store`] if the URL is malformed or the server
/// cannot be reached.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| ReconcileError::Store(format!("Failed to create Redis client: {e}")))?;

    let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
        ReconcileError::Store(format!("Failed to create Redis connection manager: {e}"))
    })?;

    tracing::info!("Redis connection manager initialized");

    Ok(conn_manager)
}
