//! Fractional discount rates.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing a [`DiscountRate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscountRateError {
    /// The rate is negative or not strictly below one.
    #[error("discount rate {0} must be in [0, 1)")]
    OutOfRange(Decimal),
    /// The value could not be represented as a decimal (NaN or infinite).
    #[error("discount rate is not a finite number")]
    NotFinite,
}

/// A discount expressed as a fraction of the subtotal.
///
/// ## Constraints
///
/// - `0 <= rate < 1`
///
/// A rate of `0.10` takes ten percent off the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DiscountRate(Decimal);

impl DiscountRate {
    /// Parse a `DiscountRate` from a decimal fraction.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountRateError::OutOfRange`] outside `[0, 1)`.
    pub fn new(rate: Decimal) -> Result<Self, DiscountRateError> {
        if rate < Decimal::ZERO || rate >= Decimal::ONE {
            return Err(DiscountRateError::OutOfRange(rate));
        }
        Ok(Self(rate.normalize()))
    }

    /// Parse a `DiscountRate` from a floating point wire value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not finite or outside `[0, 1)`.
    pub fn from_f64(rate: f64) -> Result<Self, DiscountRateError> {
        let rate = Decimal::from_f64(rate).ok_or(DiscountRateError::NotFinite)?;
        Self::new(rate)
    }

    /// The rate as a fraction.
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Whether the rate takes nothing off.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The rate as a percentage (e.g., `10` for `0.10`).
    #[must_use]
    pub fn percent(&self) -> Decimal {
        (self.0 * Decimal::ONE_HUNDRED).normalize()
    }

    /// Human-readable label, e.g. `"12.5% discount"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}% discount", self.percent())
    }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

impl TryFrom<Decimal> for DiscountRate {
    type Error = DiscountRateError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountRate> for Decimal {
    fn from(rate: DiscountRate) -> Self {
        rate.0
    }
}
