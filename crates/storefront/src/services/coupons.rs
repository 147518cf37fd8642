//! Coupon validation service client.
//!
//! Coupon eligibility is decided by an external service. This module owns
//! the wire contract and the acceptance rule for its answers: a response is
//! only turned into an [`AppliedCoupon`] when it is marked valid AND carries
//! a non-empty code, a non-zero discount within `[0, 1)`, and an owner id.
//! Partial responses are rejected even when `valid` is `true`.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tillpoint_core::{AppliedCoupon, CouponCode, DiscountRate, UserId};

use crate::config::CouponServiceConfig;

/// Errors that can occur when calling the coupon service.
#[derive(Debug, Error)]
pub enum CouponServiceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to build the client or parse the response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Something that can validate coupon codes for a user.
pub trait CouponValidator: Send + Sync {
    /// Ask whether `code` can be redeemed by `user_id`.
    fn validate(
        &self,
        code: &CouponCode,
        user_id: &UserId,
    ) -> impl Future<Output = Result<CouponValidation, CouponServiceError>> + Send;
}

/// Validation request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    code: &'a str,
    user_id: &'a str,
}

/// Raw validation answer from the coupon service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponValidation {
    #[serde(default)]
    pub valid: bool,
    pub code: Option<String>,
    pub discount_amount: Option<f64>,
    pub coupon_owner_id: Option<String>,
    pub message: Option<String>,
}

/// A validation answer that did not yield a usable coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRejection {
    /// Message from the service, if it sent one.
    pub message: Option<String>,
}

impl CouponValidation {
    /// Convert into an applied coupon if every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`CouponRejection`] carrying the service message when the
    /// answer is not valid or is missing a field.
    pub fn into_applied(self) -> Result<AppliedCoupon, CouponRejection> {
        let Self {
            valid,
            code,
            discount_amount,
            coupon_owner_id,
            message,
        } = self;

        if !valid {
            return Err(CouponRejection { message });
        }

        let code = code.as_deref().and_then(|c| CouponCode::issued(c).ok());
        let discount = discount_amount
            .and_then(|amount| DiscountRate::from_f64(amount).ok())
            .filter(|rate| !rate.is_zero());
        let owner_id = coupon_owner_id
            .filter(|owner| !owner.trim().is_empty())
            .map(UserId::new);

        match (code, discount, owner_id) {
            (Some(code), Some(discount), Some(owner_id)) => Ok(AppliedCoupon {
                code,
                discount,
                owner_id,
            }),
            _ => Err(CouponRejection { message }),
        }
    }
}

/// Coupon service client.
#[derive(Clone)]
pub struct CouponClient {
    client: reqwest::Client,
    validate_url: String,
}

impl CouponClient {
    /// Create a new coupon service client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &CouponServiceConfig, timeout: Duration) -> Result<Self, CouponServiceError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.api_token.expose_secret()))
                .map_err(|e| CouponServiceError::Parse(format!("Invalid API token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let validate_url = format!(
            "{}/coupons/validate",
            config.base_url.as_str().trim_end_matches('/')
        );

        Ok(Self {
            client,
            validate_url,
        })
    }
}

impl CouponValidator for CouponClient {
    async fn validate(
        &self,
        code: &CouponCode,
        user_id: &UserId,
    ) -> Result<CouponValidation, CouponServiceError> {
        let body = ValidateRequest {
            code: code.as_str(),
            user_id: user_id.as_str(),
        };

        let response = self
            .client
            .post(&self.validate_url)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read coupon service error body");
                String::new()
            });
            return Err(CouponServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CouponValidation>()
            .await
            .map_err(|e| CouponServiceError::Parse(e.to_string()))
    }
}
