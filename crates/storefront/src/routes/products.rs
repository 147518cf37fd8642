//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tillpoint_core::{CartStore, Price, Product, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::visitor_key;
use crate::state::AppState;

/// Product display data for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: String,
}

impl ProductView {
    fn new(product: &Product, currency: tillpoint_core::CurrencyCode) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: Price::new(product.price, currency).display(),
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: ProductView,
    /// Units of this product already in the cart.
    pub in_cart: u32,
    pub signed_in_as: Option<String>,
}

/// Display product detail page.
#[instrument(skip(state, session, shopper))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(shopper): OptionalAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(id);
    let product = state
        .catalog()
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let in_cart = state
        .lock_cart(visitor_key(&session).await?)
        .await
        .cart
        .quantity_of(&id)
        .unwrap_or(0);

    Ok(ProductShowTemplate {
        product: ProductView::new(product, state.config().currency),
        in_cart,
        signed_in_as: shopper.map(|s| s.email.unwrap_or_else(|| s.user_id.to_string())),
    })
}
