//! Applied coupon state.

use serde::{Deserialize, Serialize};

use crate::types::{CouponCode, DiscountRate, UserId};

/// The single coupon currently discounting a cart.
///
/// Only constructed from a validator response that passed every check; see
/// the storefront's coupon client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    /// Code as confirmed by the coupon service.
    pub code: CouponCode,
    /// Fraction of the subtotal taken off.
    pub discount: DiscountRate,
    /// User who issued the coupon.
    pub owner_id: UserId,
}

impl AppliedCoupon {
    /// Label shown next to the applied code, derived from the actual rate.
    #[must_use]
    pub fn label(&self) -> String {
        self.discount.label()
    }
}
