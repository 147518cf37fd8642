//! Cart total computation.
//!
//! Totals are a pure function of the live cart lines and the applied coupon.
//! Nothing here is cached; callers recompute on every render.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::cart::CartItem;
use crate::coupon::AppliedCoupon;

/// Subtotal, discount and total for a cart.
///
/// `total = subtotal - discount` and `total <= subtotal` always hold because
/// the discount rate is in `[0, 1)` and prices are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Sum of `price × quantity`.
    pub subtotal: Decimal,
    /// Amount taken off by the coupon, unrounded.
    pub discount: Decimal,
    /// Amount due, unrounded.
    pub total: Decimal,
}

impl Totals {
    /// Compute totals for the given lines and optional coupon.
    #[must_use]
    pub fn compute(items: &[CartItem], coupon: Option<&AppliedCoupon>) -> Self {
        let subtotal: Decimal = items.iter().map(CartItem::line_total).sum();
        Self::from_subtotal(subtotal, coupon)
    }

    /// Compute totals from a precomputed subtotal.
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal, coupon: Option<&AppliedCoupon>) -> Self {
        let discount = coupon.map_or(Decimal::ZERO, |c| subtotal * c.discount.value());
        Self {
            subtotal,
            discount,
            total: subtotal - discount,
        }
    }

    /// Whether a coupon reduced the total.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        !self.discount.is_zero()
    }
}
