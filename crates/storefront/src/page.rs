//! Cart page controller.
//!
//! A [`CartPage`] is mounted once per request against the visitor's cart
//! store and the external collaborators. It owns the UI state machines:
//!
//! ```text
//! coupon:   Idle -> Validating -> Applied | Error      Applied -> Idle (remove)
//! checkout: Idle -> Submitting -> Redirecting | Error
//! ```
//!
//! Identity is tracked through a [`SessionTracker`]. The page subscribes to
//! identity changes before fetching the session, and every update carries a
//! revision, so a slow fetch can never overwrite a newer notification.

use thiserror::Error;
use tillpoint_core::{
    AppliedCoupon, CartItem, CartStore, CouponCode, CouponCodeError, CurrencyCode, ProductId,
    Session, SessionTracker, Totals,
};
use url::Url;

use crate::error::add_breadcrumb;
use crate::services::checkout::{CheckoutError, CheckoutInitiator, CheckoutRequest};
use crate::services::coupons::CouponValidator;
use crate::services::identity::{IdentityError, SessionProvider, SessionSubscription};

// =============================================================================
// States
// =============================================================================

/// Coupon UI state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CouponState {
    #[default]
    Idle,
    Validating,
    Applied(AppliedCoupon),
    Error(String),
}

impl CouponState {
    /// The applied coupon, if any.
    #[must_use]
    pub const fn applied(&self) -> Option<&AppliedCoupon> {
        match self {
            Self::Applied(coupon) => Some(coupon),
            _ => None,
        }
    }

    /// The coupon error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    /// State as it may be carried to the next request.
    #[must_use]
    fn settled(self) -> Self {
        match self {
            Self::Validating => Self::Idle,
            other => other,
        }
    }
}

/// Checkout UI state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckoutState {
    #[default]
    Idle,
    Submitting,
    /// Terminal: the shopper is being sent to the hosted checkout.
    Redirecting(Url),
    Error(String),
}

impl CheckoutState {
    /// The checkout error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// User-facing failures of cart page operations.
///
/// The `Display` text of each variant is exactly what the page shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartPageError {
    #[error("Please sign in to apply a coupon")]
    AuthenticationRequired,

    #[error("{0}")]
    CouponInvalid(String),

    /// The coupon service could not be reached or answered with an error.
    #[error("Failed to validate coupon. Please try again.")]
    CouponValidationFailed,

    #[error("Checkout failed ({status}): {body}")]
    CheckoutHttp { status: u16, body: String },

    #[error("No session URL returned")]
    CheckoutResponseMalformed,

    #[error("Checkout error: {0}")]
    CheckoutTransport(String),

    #[error("Checkout is already in progress")]
    CheckoutInProgress,

    #[error("Your cart is empty")]
    EmptyCart,
}

impl From<CheckoutError> for CartPageError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Status { status, body } => Self::CheckoutHttp { status, body },
            CheckoutError::MissingSessionUrl => Self::CheckoutResponseMalformed,
            CheckoutError::Http(e) => Self::CheckoutTransport(e.to_string()),
            CheckoutError::Parse(message) => Self::CheckoutTransport(message),
            CheckoutError::Price(e) => Self::CheckoutTransport(e.to_string()),
        }
    }
}

const INVALID_COUPON: &str = "Invalid coupon";
const EMPTY_COUPON: &str = "Please enter a coupon code";

// =============================================================================
// Page
// =============================================================================

/// Collaborators the page is built with.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a, V, K> {
    pub coupons: &'a V,
    pub checkout: &'a K,
    pub currency: CurrencyCode,
}

/// A mounted cart page.
///
/// Dropping the page releases its identity subscription.
pub struct CartPage<'a, S, V, K> {
    store: &'a mut S,
    coupons: &'a V,
    checkout: &'a K,
    currency: CurrencyCode,
    session: SessionTracker,
    subscription: SessionSubscription,
    coupon: CouponState,
    coupon_input: String,
    checkout_state: CheckoutState,
}

impl<'a, S, V, K> CartPage<'a, S, V, K>
where
    S: CartStore,
    V: CouponValidator,
    K: CheckoutInitiator,
{
    /// Mount the page: subscribe to identity changes, then fetch the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity source cannot be read.
    pub async fn mount<P: SessionProvider>(
        store: &'a mut S,
        ctx: PageContext<'a, V, K>,
        provider: &P,
    ) -> Result<Self, IdentityError> {
        let subscription = provider.subscribe();
        let fetched = provider.get_session().await?;

        let mut page = Self {
            store,
            coupons: ctx.coupons,
            checkout: ctx.checkout,
            currency: ctx.currency,
            session: SessionTracker::new(),
            subscription,
            coupon: CouponState::Idle,
            coupon_input: String::new(),
            checkout_state: CheckoutState::Idle,
        };

        // Notifications that arrived during the fetch go first; the fetch
        // result only wins if it is newer.
        page.sync_session();
        if !page.session.apply(fetched) {
            tracing::debug!("Discarded stale session fetch");
        }

        Ok(page)
    }

    /// Restore coupon state carried over from a previous request.
    #[must_use]
    pub fn with_coupon_state(mut self, state: CouponState) -> Self {
        self.coupon = state.settled();
        self
    }

    /// Apply pending identity notifications. Returns `true` if the session changed.
    pub fn sync_session(&mut self) -> bool {
        let mut changed = false;
        while let Some(update) = self.subscription.try_next() {
            changed |= self.session.apply(update);
        }
        changed
    }

    // -------------------------------------------------------------------------
    // Read side
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.store.items()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.store.item_count()
    }

    /// Totals from the live cart and the applied coupon.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::from_subtotal(self.store.subtotal(), self.coupon.applied())
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.session()
    }

    #[must_use]
    pub const fn coupon(&self) -> &CouponState {
        &self.coupon
    }

    /// Current contents of the coupon input field.
    #[must_use]
    pub fn coupon_input(&self) -> &str {
        &self.coupon_input
    }

    #[must_use]
    pub const fn checkout_state(&self) -> &CheckoutState {
        &self.checkout_state
    }

    /// Whether the checkout trigger should be enabled.
    #[must_use]
    pub fn can_checkout(&self) -> bool {
        !self.store.is_empty()
            && matches!(
                self.checkout_state,
                CheckoutState::Idle | CheckoutState::Error(_)
            )
    }

    // -------------------------------------------------------------------------
    // Quantity control
    // -------------------------------------------------------------------------

    /// Increase a line's quantity by one.
    pub fn increment(&mut self, product_id: &ProductId) {
        if let Some(quantity) = self.store.quantity_of(product_id) {
            self.store
                .update_quantity(product_id, i64::from(quantity) + 1);
        }
    }

    /// Decrease a line's quantity by one. Reaching zero removes the line.
    pub fn decrement(&mut self, product_id: &ProductId) {
        if let Some(quantity) = self.store.quantity_of(product_id) {
            self.store
                .update_quantity(product_id, i64::from(quantity) - 1);
        }
    }

    pub fn remove(&mut self, product_id: &ProductId) {
        self.store.remove_item(product_id);
    }

    // -------------------------------------------------------------------------
    // Coupons
    // -------------------------------------------------------------------------

    /// Validate `input` with the coupon service and apply it.
    ///
    /// The validator is never called without a signed-in shopper.
    ///
    /// # Errors
    ///
    /// Returns the user-facing failure, which is also left in the coupon
    /// state for rendering.
    pub async fn apply_coupon(&mut self, input: &str) -> Result<AppliedCoupon, CartPageError> {
        self.sync_session();
        input.clone_into(&mut self.coupon_input);

        let Some(user_id) = self.session.session().map(|s| s.user_id.clone()) else {
            tracing::warn!("Coupon submitted without a session");
            return Err(self.coupon_failed(CartPageError::AuthenticationRequired));
        };

        let code = match CouponCode::parse(input) {
            Ok(code) => code,
            Err(CouponCodeError::Empty) => {
                return Err(self.coupon_failed(CartPageError::CouponInvalid(EMPTY_COUPON.into())));
            }
            Err(_) => {
                return Err(self.coupon_failed(CartPageError::CouponInvalid(INVALID_COUPON.into())));
            }
        };

        self.coupon = CouponState::Validating;

        let validation = match self.coupons.validate(&code, &user_id).await {
            Ok(validation) => validation,
            Err(e) => {
                tracing::error!(error = %e, code = %code, "Coupon validation failed");
                return Err(self.coupon_failed(CartPageError::CouponValidationFailed));
            }
        };

        match validation.into_applied() {
            Ok(applied) => {
                tracing::info!(code = %applied.code, discount = %applied.discount, "Coupon applied");
                add_breadcrumb("cart", "Applied coupon", Some(&[("code", applied.code.as_str())]));
                self.coupon = CouponState::Applied(applied.clone());
                self.coupon_input.clear();
                Ok(applied)
            }
            Err(rejection) => {
                let message = rejection
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| INVALID_COUPON.to_string());
                tracing::warn!(code = %code, %message, "Coupon rejected");
                Err(self.coupon_failed(CartPageError::CouponInvalid(message)))
            }
        }
    }

    /// Clear the applied coupon and any coupon error.
    pub fn remove_coupon(&mut self) {
        self.coupon = CouponState::Idle;
    }

    fn coupon_failed(&mut self, err: CartPageError) -> CartPageError {
        self.coupon = CouponState::Error(err.to_string());
        err
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Create a hosted checkout session and return the URL to redirect to.
    ///
    /// # Errors
    ///
    /// Returns the user-facing failure, which is also left in the checkout
    /// state for rendering. A checkout already submitting is refused without
    /// touching the state.
    pub async fn checkout(&mut self) -> Result<Url, CartPageError> {
        match &self.checkout_state {
            CheckoutState::Submitting => return Err(CartPageError::CheckoutInProgress),
            CheckoutState::Redirecting(url) => return Ok(url.clone()),
            CheckoutState::Idle | CheckoutState::Error(_) => {}
        }

        if self.store.is_empty() {
            let err = CartPageError::EmptyCart;
            self.checkout_state = CheckoutState::Error(err.to_string());
            return Err(err);
        }

        self.checkout_state = CheckoutState::Submitting;

        match self.create_session().await {
            Ok(url) => {
                tracing::info!(session_url = %url, "Redirecting to checkout");
                add_breadcrumb("checkout", "Redirecting to checkout", None);
                self.checkout_state = CheckoutState::Redirecting(url.clone());
                Ok(url)
            }
            Err(err) => {
                tracing::error!(error = %err, "Checkout failed");
                self.checkout_state = CheckoutState::Error(err.to_string());
                Err(err)
            }
        }
    }

    async fn create_session(&self) -> Result<Url, CartPageError> {
        let request =
            CheckoutRequest::from_cart(self.store.items(), self.currency, self.coupon.applied())
                .map_err(|e| CartPageError::CheckoutTransport(e.to_string()))?;

        Ok(self.checkout.create_session(&request).await?)
    }

    /// Hand back the coupon state for persistence.
    #[must_use]
    pub fn into_coupon_state(self) -> CouponState {
        self.coupon.settled()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;
    use tillpoint_core::{Cart, Product, Revisioned, UserId};

    use super::*;
    use crate::models::VisitorKey;
    use crate::services::coupons::{CouponServiceError, CouponValidation};
    use crate::services::identity::AuthHub;

    // -------------------------------------------------------------------------
    // Test collaborators
    // -------------------------------------------------------------------------

    enum CouponReply {
        Answer(CouponValidation),
        Unavailable,
    }

    struct MockValidator {
        reply: CouponReply,
        calls: AtomicUsize,
    }

    impl MockValidator {
        fn answering(validation: CouponValidation) -> Self {
            Self {
                reply: CouponReply::Answer(validation),
                calls: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                reply: CouponReply::Unavailable,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CouponValidator for MockValidator {
        async fn validate(
            &self,
            _code: &CouponCode,
            _user_id: &UserId,
        ) -> Result<CouponValidation, CouponServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                CouponReply::Answer(validation) => Ok(validation.clone()),
                CouponReply::Unavailable => Err(CouponServiceError::Api {
                    status: 503,
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    enum CheckoutReply {
        Session(&'static str),
        Status(u16, &'static str),
        MissingUrl,
        Transport,
    }

    struct MockCheckout {
        reply: CheckoutReply,
        calls: AtomicUsize,
        last_request: Mutex<Option<CheckoutRequest>>,
    }

    impl MockCheckout {
        fn new(reply: CheckoutReply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CheckoutInitiator for MockCheckout {
        async fn create_session(&self, request: &CheckoutRequest) -> Result<Url, CheckoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match self.reply {
                CheckoutReply::Session(url) => Ok(Url::parse(url).unwrap()),
                CheckoutReply::Status(status, body) => Err(CheckoutError::Status {
                    status,
                    body: body.to_string(),
                }),
                CheckoutReply::MissingUrl => Err(CheckoutError::MissingSessionUrl),
                // A request that never reaches the wire
                CheckoutReply::Transport => Err(CheckoutError::Http(
                    reqwest::Client::new().get("not a url").build().unwrap_err(),
                )),
            }
        }
    }

    /// Identity source whose fetch can be overtaken by a notification.
    struct TestProvider {
        hub: AuthHub,
        visitor: VisitorKey,
        fetched: Revisioned<Option<Session>>,
        publish_during_fetch: Option<Option<Session>>,
    }

    impl TestProvider {
        fn signed_in(user: &str) -> Self {
            Self::fetching(Revisioned::new(1, Some(shopper(user))))
        }

        fn anonymous() -> Self {
            Self::fetching(Revisioned::new(0, None))
        }

        fn fetching(fetched: Revisioned<Option<Session>>) -> Self {
            let hub = AuthHub::new();
            // Reserve the fetched revision so later notifications are newer
            while hub.next_revision() < fetched.revision {}
            Self {
                hub,
                visitor: VisitorKey::generate(),
                fetched,
                publish_during_fetch: None,
            }
        }
    }

    impl SessionProvider for TestProvider {
        async fn get_session(&self) -> Result<Revisioned<Option<Session>>, IdentityError> {
            if let Some(session) = &self.publish_during_fetch {
                self.hub.publish(self.visitor, session.clone());
            }
            Ok(self.fetched.clone())
        }

        fn subscribe(&self) -> SessionSubscription {
            self.hub.subscribe(self.visitor)
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn shopper(user: &str) -> Session {
        Session {
            user_id: UserId::new(user),
            email: Some(format!("{user}@example.com")),
        }
    }

    fn product(id: &str, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: dec(price),
        }
    }

    fn tee_cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(product("tee", "19.99"), 2);
        cart
    }

    fn save10() -> CouponValidation {
        CouponValidation {
            valid: true,
            code: Some("SAVE10".to_string()),
            discount_amount: Some(0.1),
            coupon_owner_id: Some("owner_1".to_string()),
            message: None,
        }
    }

    fn ctx<'a, V, K>(coupons: &'a V, checkout: &'a K) -> PageContext<'a, V, K> {
        PageContext {
            coupons,
            checkout,
            currency: CurrencyCode::USD,
        }
    }

    // -------------------------------------------------------------------------
    // Quantity control
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_increment_and_decrement() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();
        let tee = ProductId::new("tee");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();

        page.increment(&tee);
        assert_eq!(page.items()[0].quantity, 3);
        page.decrement(&tee);
        assert_eq!(page.items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_decrement_to_zero_removes_line() {
        let mut cart = Cart::new();
        cart.add_item(product("mug", "8.00"), 1);
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        page.decrement(&ProductId::new("mug"));

        assert!(page.items().is_empty());
        assert!(!page.can_checkout());
    }

    #[tokio::test]
    async fn test_remove_recomputes_totals() {
        let mut cart = tee_cart();
        cart.add_item(product("mug", "8.00"), 1);
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        assert_eq!(page.totals().subtotal, dec("47.98"));
        assert_eq!(page.item_count(), 3);

        page.remove(&ProductId::new("tee"));
        assert_eq!(page.totals().subtotal, dec("8.00"));
        assert_eq!(page.item_count(), 1);
    }

    // -------------------------------------------------------------------------
    // Coupons
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_coupon_requires_session_and_skips_validator() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.apply_coupon("SAVE10").await.unwrap_err();

        assert_eq!(err, CartPageError::AuthenticationRequired);
        assert_eq!(coupons.calls(), 0);
        assert_eq!(page.coupon().error(), Some("Please sign in to apply a coupon"));
    }

    #[tokio::test]
    async fn test_apply_coupon_discounts_total_and_clears_input() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let applied = page.apply_coupon(" SAVE10 ").await.unwrap();

        assert_eq!(applied.label(), "10% discount");
        assert_eq!(page.coupon_input(), "");
        assert_eq!(coupons.calls(), 1);

        let totals = page.totals();
        assert_eq!(totals.subtotal, dec("39.98"));
        assert_eq!(totals.discount, dec("3.998"));
        assert_eq!(totals.total, dec("35.982"));
    }

    #[tokio::test]
    async fn test_blank_code_is_rejected_locally() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.apply_coupon("   ").await.unwrap_err();

        assert_eq!(
            err,
            CartPageError::CouponInvalid("Please enter a coupon code".to_string())
        );
        assert_eq!(coupons.calls(), 0);
    }

    #[tokio::test]
    async fn test_incomplete_answer_is_invalid_and_keeps_input() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(CouponValidation {
            coupon_owner_id: None,
            ..save10()
        });
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.apply_coupon("SAVE10").await.unwrap_err();

        assert_eq!(err, CartPageError::CouponInvalid("Invalid coupon".to_string()));
        assert_eq!(page.coupon_input(), "SAVE10");
        assert!(page.coupon().applied().is_none());
        assert!(!page.totals().has_discount());
    }

    #[tokio::test]
    async fn test_rejection_surfaces_service_message() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(CouponValidation {
            valid: false,
            message: Some("Coupon expired".to_string()),
            ..CouponValidation::default()
        });
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.apply_coupon("OLD").await.unwrap_err();

        assert_eq!(err.to_string(), "Coupon expired");
        assert_eq!(page.coupon().error(), Some("Coupon expired"));
    }

    #[tokio::test]
    async fn test_validator_failure_shows_generic_message() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.apply_coupon("SAVE10").await.unwrap_err();

        assert_eq!(err, CartPageError::CouponValidationFailed);
        let message = page.coupon().error().unwrap();
        assert_eq!(message, "Failed to validate coupon. Please try again.");
        assert!(!message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_remove_coupon_resets_total_and_error() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        page.apply_coupon("SAVE10").await.unwrap();
        page.remove_coupon();

        let totals = page.totals();
        assert_eq!(totals.total, totals.subtotal);
        assert_eq!(page.coupon(), &CouponState::Idle);
        assert_eq!(coupons.calls(), 1);
    }

    #[tokio::test]
    async fn test_coupon_state_survives_next_request() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        page.apply_coupon("SAVE10").await.unwrap();
        let saved = page.into_coupon_state();

        let restored = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap()
            .with_coupon_state(saved);
        assert_eq!(restored.totals().total, dec("35.982"));
    }

    #[tokio::test]
    async fn test_validating_is_never_restored() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap()
            .with_coupon_state(CouponState::Validating);

        assert_eq!(page.coupon(), &CouponState::Idle);
    }

    // -------------------------------------------------------------------------
    // Checkout flow
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_checkout_redirects_to_exact_url() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::Session("https://pay.example/sess_1"));
        let provider = TestProvider::signed_in("user_1");

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        page.apply_coupon("SAVE10").await.unwrap();
        let url = page.checkout().await.unwrap();

        assert_eq!(url.as_str(), "https://pay.example/sess_1");
        assert_eq!(page.checkout_state(), &CheckoutState::Redirecting(url));

        let request = checkout.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(request.items[0].price_data.unit_amount, 1999);
        assert_eq!(request.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_redirecting_does_not_resubmit() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::Session("https://pay.example/sess_1"));
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        page.checkout().await.unwrap();
        page.checkout().await.unwrap();

        assert_eq!(checkout.calls(), 1);
        assert!(!page.can_checkout());
    }

    #[tokio::test]
    async fn test_checkout_http_error_embeds_status_and_body() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::Status(500, "Internal error"));
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.checkout().await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("Internal error"));
        assert_eq!(page.checkout_state().error(), Some(message.as_str()));
        assert!(page.can_checkout());
    }

    #[tokio::test]
    async fn test_checkout_missing_url() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.checkout().await.unwrap_err();

        assert_eq!(err, CartPageError::CheckoutResponseMalformed);
        assert_eq!(err.to_string(), "No session URL returned");
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_underlying_message() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::Transport);
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        let err = page.checkout().await.unwrap_err();

        let underlying = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err()
            .to_string();
        assert!(matches!(err, CartPageError::CheckoutTransport(_)));
        assert_eq!(err.to_string(), format!("Checkout error: {underlying}"));
        assert_eq!(
            page.checkout_state().error(),
            Some(format!("Checkout error: {underlying}").as_str())
        );
        assert_eq!(checkout.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_cart_never_calls_endpoint() {
        let mut cart = Cart::new();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::Session("https://pay.example/sess_1"));
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();

        assert_eq!(page.checkout().await.unwrap_err(), CartPageError::EmptyCart);
        assert_eq!(checkout.calls(), 0);
    }

    #[tokio::test]
    async fn test_checkout_refused_while_submitting() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::Session("https://pay.example/sess_1"));
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        page.checkout_state = CheckoutState::Submitting;

        assert_eq!(
            page.checkout().await.unwrap_err(),
            CartPageError::CheckoutInProgress
        );
        assert_eq!(checkout.calls(), 0);
        assert!(!page.can_checkout());
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_stale_fetch_does_not_overwrite_newer_notification() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let mut provider = TestProvider::signed_in("user_1");
        // Sign-out lands while the initial fetch is still in flight
        provider.publish_during_fetch = Some(None);

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();

        assert!(page.session().is_none());
        assert_eq!(
            page.apply_coupon("SAVE10").await.unwrap_err(),
            CartPageError::AuthenticationRequired
        );
        assert_eq!(coupons.calls(), 0);
    }

    #[tokio::test]
    async fn test_sign_in_after_mount_is_picked_up() {
        let mut cart = tee_cart();
        let coupons = MockValidator::answering(save10());
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let mut page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        provider
            .hub
            .publish(provider.visitor, Some(shopper("user_2")));

        page.apply_coupon("SAVE10").await.unwrap();
        assert_eq!(page.session().unwrap().user_id.as_str(), "user_2");
    }

    #[tokio::test]
    async fn test_dropping_page_releases_subscription() {
        let mut cart = tee_cart();
        let coupons = MockValidator::unavailable();
        let checkout = MockCheckout::new(CheckoutReply::MissingUrl);
        let provider = TestProvider::anonymous();

        let page = CartPage::mount(&mut cart, ctx(&coupons, &checkout), &provider)
            .await
            .unwrap();
        assert_eq!(provider.hub.subscriber_count(), 1);

        drop(page);
        assert_eq!(provider.hub.subscriber_count(), 0);
    }
}
