//! Fixed-point arithmetic and mathematical utilities.
//!
//! Token amounts are 18-decimal integers, so products such as `deposit * P`
//! exceed `u128`. Every multiply-then-divide goes through a 256-bit
//! intermediate and is checked on the way back down.

use crate::error::{Error, Result};
use crate::utils::constants::DECIMAL_PRECISION;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use primitive_types::U256;

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision
/// Used for the product factor P, prices and collateral ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FixedPoint(u128);

impl FixedPoint {
    /// Scale factor: 10^18
    pub const SCALE: u128 = DECIMAL_PRECISION;

    /// One (1.0)
    pub const ONE: Self = Self(Self::SCALE);

    /// Create a new FixedPoint from raw value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from an integer (scales up)
    pub fn from_integer(value: u64) -> Self {
        Self((value as u128) * Self::SCALE)
    }

    /// Create from percentage (100 = 100%)
    pub fn from_percentage(pct: u64) -> Self {
        Self((pct as u128) * Self::SCALE / 100)
    }

    /// Ratio `numerator / denominator` as a fixed-point value
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self> {
        mul_div(numerator, Self::SCALE, denominator).map(Self)
    }

    /// Get the raw underlying value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Apply this factor to an integer amount: `amount * self / 1e18`
    pub fn mul_amount(self, amount: u128) -> Result<u128> {
        mul_div(amount, self.0, Self::SCALE)
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        write!(f, "{}.{:018}", whole, frac)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDE ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes `(a * b) / c` with a 256-bit intermediate, truncating
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    let result = mul_div_wide(U256::from(a), U256::from(b), U256::from(c))?;
    to_u128(result, "mul_div")
}

/// Computes `(a * b) / c` entirely in 256 bits, truncating
pub fn mul_div_wide(a: U256, b: U256, c: U256) -> Result<U256> {
    if c.is_zero() {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let product = a.checked_mul(b).ok_or_else(|| Error::Overflow {
        operation: format!("({} * {}) / {}", a, b, c),
    })?;
    Ok(product / c)
}

/// Safe addition of two 256-bit accumulators
pub fn add_wide(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or_else(|| Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction of two 256-bit accumulators
pub fn sub_wide(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or_else(|| Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// Narrow a 256-bit value back to `u128`
pub fn to_u128(value: U256, operation: &str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: operation.to_string(),
        });
    }
    Ok(value.as_u128())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_display() {
        let value = FixedPoint::from_raw(1_500_000_000_000_000_000);
        assert_eq!(value.to_string(), "1.500000000000000000");
    }

    #[test]
    fn test_mul_amount_exceeds_u128_intermediate() {
        // 1e22 * 1e18 would overflow u128 before dividing
        let amount = 10_000 * DECIMAL_PRECISION;
        let p = FixedPoint::from_raw(DECIMAL_PRECISION / 2);
        assert_eq!(p.mul_amount(amount).unwrap(), 5_000 * DECIMAL_PRECISION);
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(10, 20, 3).unwrap(), 66);
        assert!(mul_div(1, 1, 0).is_err());
        assert!(mul_div(u128::MAX, u128::MAX, 1).is_err());
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
    }

    #[test]
    fn test_fixed_point_constructors() {
        assert_eq!(FixedPoint::from_integer(2).raw(), 2 * FixedPoint::SCALE);
        assert_eq!(FixedPoint::from_percentage(110).raw(), 1_100_000_000_000_000_000);
        assert_eq!(FixedPoint::from_ratio(3, 2).unwrap().raw(), 1_500_000_000_000_000_000);
        assert!(FixedPoint::from_ratio(1, 0).is_err());
        assert!(FixedPoint::from_raw(0).is_zero());
    }

    #[test]
    fn test_wide_helpers() {
        let a = U256::from(u128::MAX);
        let sum = add_wide(a, a).unwrap();
        assert!(to_u128(sum, "test").is_err());
        assert_eq!(sub_wide(sum, a).unwrap(), a);
        assert!(sub_wide(U256::zero(), U256::one()).is_err());
    }
}
