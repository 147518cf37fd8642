//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Redirect to /cart
//! GET  /health                 - Health check
//!
//! # Products
//! GET  /products/{id}          - Product detail
//!
//! # Cart (HTMX fragments or full page)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (HTMX: count badge, triggers cart-updated)
//! POST /cart/increment         - Quantity + 1
//! POST /cart/decrement         - Quantity - 1, removing the line at zero
//! POST /cart/remove            - Remove line
//! POST /cart/coupon            - Apply coupon (rate limited)
//! POST /cart/coupon/remove     - Remove coupon
//!
//! # Checkout
//! POST /checkout               - 303 to the hosted checkout (HX-Redirect for HTMX)
//!
//! # Auth
//! POST /auth/session           - Development sign-in (STOREFRONT_DEV_SIGN_IN only)
//! POST /auth/logout            - Sign out
//! ```

pub mod auth;
pub mod cart;
pub mod products;

use std::path::Path;
use std::time::Duration;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    services::ServeDir,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::middleware::{
    coupon_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes(dev_sign_in: bool) -> Router<AppState> {
    let router = Router::new().route("/logout", post(auth::logout));

    if dev_sign_in {
        tracing::warn!("Development sign-in is enabled at /auth/session");
        router.route("/session", post(auth::sign_in))
    } else {
        router
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let coupon = Router::new()
        .route("/coupon", post(cart::apply_coupon))
        .layer(coupon_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
        .route("/coupon/remove", post(cart::remove_coupon))
        .merge(coupon)
}

/// Create all routes for the storefront.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/cart") }))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(cart::checkout))
        .nest("/auth", auth_routes(state.config().dev_sign_in))
}

/// Build the full application: routes, static files and middleware.
///
/// `static_dir` is served under `/static`.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes(&state))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http_request",
                                method = %request.method(),
                                uri = %request.uri(),
                                request_id = tracing::field::Empty,
                                status = tracing::field::Empty,
                                latency_ms = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |response: &axum::http::Response<_>,
                             latency: Duration,
                             span: &Span| {
                                span.record("status", response.status().as_u16());
                                span.record(
                                    "latency_ms",
                                    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                                );
                                DefaultOnResponse::default().on_response(response, latency, span);
                            },
                        ),
                )
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(session_layer)
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    security_headers_middleware,
                )),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check collaborators.
async fn health() -> &'static str {
    "ok"
}
