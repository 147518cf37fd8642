//! Tillpoint Core - Shared cart and pricing types.
//!
//! This crate provides the domain model used by the storefront:
//! - `cart` - Cart store trait and the in-memory cart
//! - `coupon` - The applied coupon
//! - `totals` - Subtotal/discount/total computation
//! - `session` - Shopper identity with revision-ordered updates
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, discount rates and coupon codes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod coupon;
pub mod session;
pub mod totals;
pub mod types;

pub use cart::{Cart, CartItem, CartStore, Product};
pub use coupon::AppliedCoupon;
pub use session::{Revisioned, Session, SessionTracker};
pub use totals::Totals;
pub use types::*;
