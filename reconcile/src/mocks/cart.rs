//! Mock cart resolver for testing.

use crate::error::{ReconcileError, Result};
use crate::providers::CartResolver;
use crate::types::{CartId, PaymentReference};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock cart resolver backed by a shared map.
#[derive(Debug, Clone, Default)]
pub struct MockCartResolver {
    links: Arc<Mutex<HashMap<String, CartId>>>,
    fail: Arc<AtomicBool>,
}

impl MockCartResolver {
    /// Create a resolver with no links.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a reference to a cart.
    pub fn link(&self, reference: &str, cart_id: &str) {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.to_string(), CartId::new(cart_id));
    }

    /// Remove a link.
    pub fn unlink(&self, reference: &str) {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(reference);
    }

    /// Make every lookup fail with a store error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CartResolver for MockCartResolver {
    async fn resolve_cart_id(&self, reference: &PaymentReference) -> Result<Option<CartId>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReconcileError::Store("mock cart lookup failure".to_string()));
        }

        Ok(self
            .links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference.as_str())
            .cloned())
    }
}
