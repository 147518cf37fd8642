//! Server-side carts, one per visitor.
//!
//! The cookie session only carries the visitor key and identity. A request
//! that touches the cart holds the visitor's lock for its whole duration, so
//! requests from one visitor apply one after another to the live cart.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tillpoint_core::Cart;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::VisitorKey;
use crate::page::CouponState;

/// Everything the cart page keeps for a visitor between requests.
#[derive(Debug, Clone, Default)]
pub struct VisitorCart {
    pub cart: Cart,
    pub coupon: CouponState,
}

/// Exclusive access to a visitor's cart. Released on drop.
pub type CartLock = OwnedMutexGuard<VisitorCart>;

/// Per-visitor carts, evicted after the same inactivity as the session.
#[derive(Clone)]
pub struct CartRegistry {
    carts: Cache<VisitorKey, Arc<Mutex<VisitorCart>>>,
}

impl CartRegistry {
    /// Create a registry dropping carts untouched for `idle`.
    ///
    /// No capacity bound; an entry is only evicted once idle.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self {
            carts: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// Lock a visitor's cart, creating an empty one on first use.
    ///
    /// Waits while another request from the same visitor holds it.
    pub async fn lock(&self, visitor: VisitorKey) -> CartLock {
        let entry = self
            .carts
            .get_with(visitor, async { Arc::new(Mutex::new(VisitorCart::default())) })
            .await;
        entry.lock_owned().await
    }
}

impl std::fmt::Debug for CartRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRegistry")
            .field("entries", &self.carts.entry_count())
            .finish()
    }
}
