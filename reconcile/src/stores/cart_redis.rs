//! Redis-backed cart-reference resolver.
//!
//! The booking flow records `{prefix}:cart:{reference}` → cart id when it
//! creates the reservation hold. This resolver only reads it, apart from
//! [`RedisCartResolver::link_cart`] which operators use to repair a missing
//! link.

use crate::error::Result;
use crate::providers::CartResolver;
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Cart lookup on `Redis`.
#[derive(Clone)]
pub struct RedisCartResolver {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisCartResolver {
    /// Create a resolver on an existing connection.
    #[must_use]
    pub fn new(conn_manager: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn_manager,
            key_prefix: key_prefix.into(),
        }
    }

    fn cart_key(&self, reference: &PaymentReference) -> String {
        format!("{}:cart:{reference}", self.key_prefix)
    }

    /// Link a reference to a cart.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Store`] if `Redis` is unreachable.
    pub async fn link_cart(&self, reference: &PaymentReference, cart_id: &CartId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.set(self.cart_key(reference), cart_id.as_str()).await?;
        tracing::info!(reference = %reference, cart_id = %cart_id, "Cart linked");
        Ok(())
    }
}

#[async_trait]
impl CartResolver for RedisCartResolver {
    async fn resolve_cart_id(&self, reference: &PaymentReference) -> Result<Option<CartId>> {
        let mut conn = self.conn_manager.clone();
        let cart: Option<String> = conn.get(self.cart_key(reference)).await?;
        Ok(cart.filter(|c| !c.is_empty()).map(CartId::new))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use crate::stores::connect;
    use uuid::Uuid;

    #[tokio::test]
    #[ignore] // Requires Redis running at localhost:6379
    async fn test_link_then_resolve() {
        let conn = connect("redis://127.0.0.1:6379")
            .await
            .expect("Failed to connect to Redis");
        let resolver = RedisCartResolver::new(conn, format!("test:{}", Uuid::new_v4()));
        let reference = PaymentReference::parse("abc123").unwrap();

        assert_eq!(resolver.resolve_cart_id(&reference).await.unwrap(), None);

        resolver
            .link_cart(&reference, &CartId::new("cart-789"))
            .await
            .unwrap();
        assert_eq!(
            resolver.resolve_cart_id(&reference).await.unwrap(),
            Some(CartId::new("cart-789"))
        );
    }
}
