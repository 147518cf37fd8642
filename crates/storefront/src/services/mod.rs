//! External collaborators of the storefront.
//!
//! # Services
//!
//! - `coupons` - Coupon validation service client
//! - `checkout` - Hosted checkout session endpoint client
//! - `identity` - Shopper identity source and change notifications

pub mod checkout;
pub mod coupons;
pub mod identity;

pub use checkout::{CheckoutClient, CheckoutError, CheckoutInitiator, CheckoutRequest};
pub use coupons::{CouponClient, CouponServiceError, CouponValidation, CouponValidator};
pub use identity::{AuthHub, IdentityError, SessionProvider, SessionSubscription, VisitorIdentity};
