//! Checkout session endpoint client.
//!
//! The checkout endpoint turns cart lines into a hosted payment session and
//! answers with the URL the shopper is sent to. Payment processing itself
//! happens entirely on the other side of that URL.
//!
//! # Wire Contract
//!
//! ```text
//! POST {CHECKOUT_URL}
//! {
//!   "items": [{
//!     "price_data": {
//!       "currency": "usd",
//!       "product_data": { "name": "Tee" },
//!       "unit_amount": 1999
//!     },
//!     "quantity": 2
//!   }],
//!   "couponCode": "SAVE10"          // omitted without a coupon
//! }
//!
//! 2xx  -> { "sessionUrl": "https://pay.example/sess_1" }
//! else -> text error body
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tillpoint_core::{AppliedCoupon, CartItem, CurrencyCode, Price, PriceError};
use url::Url;

use crate::config::CheckoutConfig;

/// Errors that can occur when creating a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("Checkout failed ({status}): {body}")]
    Status { status: u16, body: String },

    /// Success response without a session URL.
    #[error("No session URL returned")]
    MissingSessionUrl,

    /// Response body or session URL could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A line price could not be expressed in minor units.
    #[error("Invalid price: {0}")]
    Price(#[from] PriceError),
}

/// Something that can turn a cart into a hosted payment session.
pub trait CheckoutInitiator: Send + Sync {
    /// Create a checkout session and return the URL to redirect to.
    fn create_session(
        &self,
        request: &CheckoutRequest,
    ) -> impl Future<Output = Result<Url, CheckoutError>> + Send;
}

/// Checkout request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLineItem>,
    #[serde(rename = "couponCode", skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// One line as the payment processor expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLineItem {
    pub price_data: PriceData,
    pub quantity: u32,
}

/// Unit price of a line in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceData {
    pub currency: CurrencyCode,
    pub product_data: ProductData,
    pub unit_amount: i64,
}

/// Product description shown on the hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductData {
    pub name: String,
}

impl CheckoutRequest {
    /// Build a request from cart lines and the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if a unit price does not fit in minor units.
    pub fn from_cart(
        items: &[CartItem],
        currency: CurrencyCode,
        coupon: Option<&AppliedCoupon>,
    ) -> Result<Self, PriceError> {
        let items = items
            .iter()
            .map(|item| {
                let unit_amount = Price::new(item.product.price, currency).to_minor_units()?;
                Ok(CheckoutLineItem {
                    price_data: PriceData {
                        currency,
                        product_data: ProductData {
                            name: item.product.name.clone(),
                        },
                        unit_amount,
                    },
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, PriceError>>()?;

        Ok(Self {
            items,
            coupon_code: coupon.map(|c| c.code.to_string()),
        })
    }
}

/// Checkout endpoint success body.
#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    #[serde(rename = "sessionUrl")]
    session_url: Option<String>,
}

/// Checkout endpoint client.
#[derive(Clone)]
pub struct CheckoutClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl CheckoutClient {
    /// Create a new checkout client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CheckoutConfig, timeout: Duration) -> Result<Self, CheckoutError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl CheckoutInitiator for CheckoutClient {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<Url, CheckoutError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read checkout error body");
                String::new()
            });
            tracing::error!(status = status.as_u16(), body = %body, "Checkout endpoint error");
            return Err(CheckoutError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| CheckoutError::Parse(e.to_string()))?;

        let session_url = parsed
            .session_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(CheckoutError::MissingSessionUrl)?;

        Url::parse(&session_url).map_err(|e| CheckoutError::Parse(format!("session URL: {e}")))
    }
}
