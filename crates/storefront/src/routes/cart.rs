//! Cart route handlers.
//!
//! Every cart request locks the visitor's server-side cart, mounts a
//! [`CartPage`] over it, performs one action, and renders the result.
//! The lock is held until the view is built. HTMX requests
//! (`HX-Request` header) get the cart panel fragment; plain form posts get
//! the full page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tillpoint_core::{CartStore, CurrencyCode, Price, ProductId};
use tower_sessions::Session;
use tracing::instrument;
use url::Url;

use crate::error::{AppError, Result};
use crate::carts::VisitorCart;
use crate::models::visitor_key;
use crate::page::{CartPage, CartPageError, PageContext};
use crate::services::identity::VisitorIdentity;
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub id: String,
    pub name: String,
    pub url: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Applied coupon display data for templates.
#[derive(Debug, Clone)]
pub struct AppliedCouponView {
    pub code: String,
    pub label: String,
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    /// Formatted discount, only when a coupon reduced the total.
    pub discount: Option<String>,
    pub total: String,
    pub coupon: Option<AppliedCouponView>,
    pub coupon_error: Option<String>,
    pub coupon_input: String,
    pub checkout_error: Option<String>,
    pub can_checkout: bool,
    pub signed_in_as: Option<String>,
    pub dev_sign_in: bool,
}

fn format_price(amount: rust_decimal::Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

impl CartView {
    /// Snapshot a mounted page for rendering.
    pub fn from_page<S, V, K>(page: &CartPage<'_, S, V, K>, dev_sign_in: bool) -> Self
    where
        S: CartStore,
        V: crate::services::CouponValidator,
        K: crate::services::CheckoutInitiator,
    {
        let currency = page.currency();
        let totals = page.totals();

        let items = page
            .items()
            .iter()
            .map(|item| CartItemView {
                id: item.product.id.to_string(),
                name: item.product.name.clone(),
                url: format!("/products/{}", item.product.id),
                quantity: item.quantity,
                price: format_price(item.product.price, currency),
                line_price: format_price(item.line_total(), currency),
            })
            .collect();

        Self {
            items,
            item_count: page.item_count(),
            subtotal: format_price(totals.subtotal, currency),
            discount: totals
                .has_discount()
                .then(|| format!("-{}", format_price(totals.discount, currency))),
            total: format_price(totals.total, currency),
            coupon: page.coupon().applied().map(|coupon| AppliedCouponView {
                code: coupon.code.to_string(),
                label: coupon.label(),
            }),
            coupon_error: page.coupon().error().map(String::from),
            coupon_input: page.coupon_input().to_string(),
            checkout_error: page.checkout_state().error().map(String::from),
            can_checkout: page.can_checkout(),
            signed_in_as: page.session().map(|s| {
                s.email
                    .clone()
                    .unwrap_or_else(|| s.user_id.to_string())
            }),
            dev_sign_in,
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Form naming a cart line.
#[derive(Debug, Deserialize)]
pub struct LineForm {
    pub product_id: String,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub code: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
}

/// Cart panel fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_panel.html")]
pub struct CartPanelTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Page Driver
// =============================================================================

/// One cart page operation.
#[derive(Debug)]
enum CartAction {
    View,
    Increment(ProductId),
    Decrement(ProductId),
    Remove(ProductId),
    ApplyCoupon(String),
    RemoveCoupon,
    Checkout,
}

/// Result of running a cart action.
struct Outcome {
    view: CartView,
    redirect: Option<Url>,
}

/// Mount the visitor's cart page and run `action` under the cart lock.
///
/// The coupon state is written back only once the action completes, so a
/// request dropped mid-validation leaves the previous state in place.
async fn run(state: &AppState, session: &Session, action: CartAction) -> Result<Outcome> {
    let visitor = visitor_key(session).await?;
    let mut entry = state.lock_cart(visitor).await;
    let VisitorCart { cart, coupon } = &mut *entry;
    let identity = VisitorIdentity::new(session, state.auth(), visitor);
    let ctx = PageContext {
        coupons: state.coupons(),
        checkout: state.checkout(),
        currency: state.config().currency,
    };

    let mut page = CartPage::mount(cart, ctx, &identity)
        .await?
        .with_coupon_state(coupon.clone());

    let mut redirect = None;
    match action {
        CartAction::View => {}
        CartAction::Increment(id) => page.increment(&id),
        CartAction::Decrement(id) => page.decrement(&id),
        CartAction::Remove(id) => page.remove(&id),
        // Failures are rendered from the page state
        CartAction::ApplyCoupon(code) => {
            page.apply_coupon(&code).await.ok();
        }
        CartAction::RemoveCoupon => page.remove_coupon(),
        CartAction::Checkout => redirect = page.checkout().await.ok(),
    }

    let view = CartView::from_page(&page, state.config().dev_sign_in);
    *coupon = page.into_coupon_state();

    Ok(Outcome { view, redirect })
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// Full page for plain requests, panel fragment for HTMX.
fn render(headers: &HeaderMap, cart: CartView) -> Response {
    if is_htmx(headers) {
        CartPanelTemplate { cart }.into_response()
    } else {
        CartShowTemplate { cart }.into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Response> {
    let outcome = run(&state, &session, CartAction::View).await?;
    Ok(CartShowTemplate { cart: outcome.view }.into_response())
}

/// Add item to cart.
///
/// HTMX requests get the cart count badge with an `HX-Trigger` so other
/// elements can refresh; plain requests are redirected to the cart.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }

    let product = state
        .catalog()
        .get(&ProductId::new(form.product_id.as_str()))
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.product_id)))?;

    let mut entry = state.lock_cart(visitor_key(&session).await?).await;
    tracing::info!(product_id = %product.id, quantity, "Adding to cart");
    entry.cart.add_item(product, quantity);

    if is_htmx(&headers) {
        Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: entry.cart.item_count(),
            },
        )
            .into_response())
    } else {
        Ok(Redirect::to("/cart").into_response())
    }
}

/// Increase a line's quantity by one.
#[instrument(skip(state, session, headers))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let action = CartAction::Increment(ProductId::new(form.product_id));
    let outcome = run(&state, &session, action).await?;
    Ok(render(&headers, outcome.view))
}

/// Decrease a line's quantity by one, removing it at zero.
#[instrument(skip(state, session, headers))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let action = CartAction::Decrement(ProductId::new(form.product_id));
    let outcome = run(&state, &session, action).await?;
    Ok(render(&headers, outcome.view))
}

/// Remove a line.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let action = CartAction::Remove(ProductId::new(form.product_id));
    let outcome = run(&state, &session, action).await?;
    Ok(render(&headers, outcome.view))
}

/// Apply a coupon code.
#[instrument(skip(state, session, headers))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CouponForm>,
) -> Result<Response> {
    let outcome = run(&state, &session, CartAction::ApplyCoupon(form.code)).await?;
    Ok(render(&headers, outcome.view))
}

/// Remove the applied coupon.
#[instrument(skip(state, session, headers))]
pub async fn remove_coupon(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let outcome = run(&state, &session, CartAction::RemoveCoupon).await?;
    Ok(render(&headers, outcome.view))
}

/// Start checkout.
///
/// On success, plain requests get `303 See Other` to the hosted checkout and
/// HTMX requests get `HX-Redirect`. On failure the cart is rendered with the
/// error. A second checkout from the same visitor while one is in flight is
/// refused.
#[instrument(skip(state, session, headers))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let visitor = visitor_key(&session).await?;

    let Some(_guard) = state.checkout_guards().try_acquire(visitor) else {
        tracing::warn!(%visitor, "Checkout already in flight");
        let mut outcome = run(&state, &session, CartAction::View).await?;
        outcome.view.checkout_error = Some(CartPageError::CheckoutInProgress.to_string());
        outcome.view.can_checkout = false;
        return Ok((StatusCode::CONFLICT, render(&headers, outcome.view)).into_response());
    };

    let outcome = run(&state, &session, CartAction::Checkout).await?;

    match outcome.redirect {
        Some(url) => Ok(checkout_redirect(&headers, &url)),
        None => Ok(render(&headers, outcome.view)),
    }
}

/// Redirect to the hosted checkout, preserving the URL exactly.
fn checkout_redirect(headers: &HeaderMap, url: &Url) -> Response {
    let Ok(location) = HeaderValue::from_str(url.as_str()) else {
        return AppError::Internal(format!("unrepresentable session URL: {url}")).into_response();
    };

    if is_htmx(headers) {
        (StatusCode::OK, [("HX-Redirect", location)]).into_response()
    } else {
        (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
    }
}
