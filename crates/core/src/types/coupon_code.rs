//! Coupon code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CouponCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponCodeError {
    /// The input is empty after trimming.
    #[error("coupon code cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("coupon code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace between characters.
    #[error("coupon code cannot contain whitespace")]
    ContainsWhitespace,
}

/// A coupon code as typed by the shopper.
///
/// Surrounding whitespace is trimmed. Case is preserved; whether codes are
/// case-sensitive is up to the coupon service.
///
/// ## Constraints
///
/// - Length: 1-64 characters after trimming
/// - No interior whitespace
///
/// ## Examples
///
/// ```
/// use tillpoint_core::CouponCode;
///
/// assert_eq!(CouponCode::parse("  SAVE10 ").unwrap().as_str(), "SAVE10");
/// assert!(CouponCode::parse("   ").is_err());
/// assert!(CouponCode::parse("SAVE 10").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CouponCode(String);

impl CouponCode {
    /// Maximum length of a coupon code.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `CouponCode` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than
    /// [`Self::MAX_LENGTH`], or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, CouponCodeError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(CouponCodeError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(CouponCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(CouponCodeError::ContainsWhitespace);
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Accept a code issued by the coupon service.
    ///
    /// Only surrounding whitespace is trimmed; the service owns its own
    /// format, so length and interior whitespace are not checked.
    ///
    /// # Errors
    ///
    /// Returns [`CouponCodeError::Empty`] if the trimmed input is empty.
    pub fn issued(s: &str) -> Result<Self, CouponCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CouponCodeError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `CouponCode` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CouponCode {
    type Err = CouponCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for CouponCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims() {
        let code = CouponCode::parse("\tWELCOME5\n").unwrap();
        assert_eq!(code.as_str(), "WELCOME5");
    }

    #[test]
    fn test_parse_preserves_case() {
        assert_eq!(CouponCode::parse("Save10").unwrap().as_str(), "Save10");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(CouponCode::parse(""), Err(CouponCodeError::Empty));
        assert_eq!(CouponCode::parse("   "), Err(CouponCodeError::Empty));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "A".repeat(CouponCode::MAX_LENGTH + 1);
        assert!(matches!(
            CouponCode::parse(&long),
            Err(CouponCodeError::TooLong { .. })
        ));
        assert!(CouponCode::parse(&"A".repeat(CouponCode::MAX_LENGTH)).is_ok());
    }

    #[test]
    fn test_parse_interior_whitespace() {
        assert_eq!(
            CouponCode::parse("SAVE 10"),
            Err(CouponCodeError::ContainsWhitespace)
        );
    }

    #[test]
    fn test_issued_accepts_service_formats() {
        assert_eq!(CouponCode::issued(" SPRING 10 ").unwrap().as_str(), "SPRING 10");
        let long = "B".repeat(CouponCode::MAX_LENGTH + 10);
        assert_eq!(CouponCode::issued(&long).unwrap().as_str(), long);
        assert_eq!(CouponCode::issued("  "), Err(CouponCodeError::Empty));
    }

    #[test]
    fn test_from_str() {
        let code: CouponCode = "SPRING".parse().unwrap();
        assert_eq!(code.to_string(), "SPRING");
    }
}
