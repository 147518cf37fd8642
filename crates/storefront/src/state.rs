//! Application state shared across handlers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;

use crate::carts::{CartLock, CartRegistry};
use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::middleware::content_security_policy;
use crate::middleware::session::SESSION_EXPIRY_SECONDS;
use crate::models::VisitorKey;
use crate::services::{AuthHub, CheckoutClient, CheckoutError, CouponClient, CouponServiceError};

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("coupon client: {0}")]
    Coupons(#[from] CouponServiceError),
    #[error("checkout client: {0}")]
    Checkout(#[from] CheckoutError),
    #[error("invalid content security policy: {0}")]
    Csp(#[from] InvalidHeaderValue),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the collaborator clients, the catalog and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    coupons: CouponClient,
    checkout: CheckoutClient,
    auth: AuthHub,
    catalog: Catalog,
    carts: CartRegistry,
    checkout_guards: CheckoutGuards,
    content_security_policy: HeaderValue,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the CSP header
    /// cannot be formed from the configured origins.
    pub fn new(config: StorefrontConfig, catalog: Catalog) -> Result<Self, StateError> {
        let coupons = CouponClient::new(&config.coupons, config.http_timeout)?;
        let checkout = CheckoutClient::new(&config.checkout, config.http_timeout)?;
        let content_security_policy = HeaderValue::from_str(&content_security_policy(
            &config.checkout.form_action_origins(),
        ))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                coupons,
                checkout,
                auth: AuthHub::new(),
                catalog,
                carts: CartRegistry::new(Duration::from_secs(
                    SESSION_EXPIRY_SECONDS.unsigned_abs(),
                )),
                checkout_guards: CheckoutGuards::default(),
                content_security_policy,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the coupon service client.
    #[must_use]
    pub fn coupons(&self) -> &CouponClient {
        &self.inner.coupons
    }

    /// Get a reference to the checkout endpoint client.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutClient {
        &self.inner.checkout
    }

    /// Get a reference to the identity change hub.
    #[must_use]
    pub fn auth(&self) -> &AuthHub {
        &self.inner.auth
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Lock a visitor's cart for the rest of the request.
    pub async fn lock_cart(&self, visitor: VisitorKey) -> CartLock {
        self.inner.carts.lock(visitor).await
    }

    /// Visitors with a checkout in flight.
    #[must_use]
    pub fn checkout_guards(&self) -> &CheckoutGuards {
        &self.inner.checkout_guards
    }

    /// Precomputed `Content-Security-Policy` header value.
    #[must_use]
    pub fn content_security_policy(&self) -> &HeaderValue {
        &self.inner.content_security_policy
    }
}

// =============================================================================
// In-flight checkout guard
// =============================================================================

/// Set of visitors whose checkout request is still running.
///
/// Each request mounts its own cart page, so the page's `Submitting` state
/// cannot see a second request from the same visitor. This set can.
#[derive(Debug, Default)]
pub struct CheckoutGuards {
    in_flight: Mutex<HashSet<VisitorKey>>,
}

impl CheckoutGuards {
    /// Mark a visitor's checkout as in flight.
    ///
    /// Returns `None` if one is already running. The mark is cleared when the
    /// returned guard is dropped.
    pub fn try_acquire(&self, visitor: VisitorKey) -> Option<CheckoutGuard<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(visitor);
        inserted.then_some(CheckoutGuard {
            guards: self,
            visitor,
        })
    }

    #[cfg(test)]
    fn is_in_flight(&self, visitor: VisitorKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&visitor)
    }
}

/// Releases a visitor's in-flight mark on drop.
#[derive(Debug)]
pub struct CheckoutGuard<'a> {
    guards: &'a CheckoutGuards,
    visitor: VisitorKey,
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        self.guards
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.visitor);
    }
}
