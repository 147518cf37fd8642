//! Core types for Tillpoint.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coupon_code;
pub mod discount;
pub mod id;
pub mod price;

pub use coupon_code::{CouponCode, CouponCodeError};
pub use discount::{DiscountRate, DiscountRateError};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
