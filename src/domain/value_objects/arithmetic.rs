//! # Checked Arithmetic
//!
//! Decimal helpers for cent-exact ledger math. Nothing here panics; every
//! fallible step returns an [`ArithmeticError`].
//!
//! ```
//! use settlement_ledger::domain::value_objects::arithmetic::{proportion, truncate_to_scale};
//! use rust_decimal::Decimal;
//!
//! // 8% of 2000.00
//! let share = proportion(Decimal::new(200_000, 2), 800, 10_000).unwrap();
//! assert_eq!(truncate_to_scale(share, 2), Decimal::new(16_000, 2));
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Arithmetic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ArithmeticError {
    /// The result does not fit a decimal.
    #[error("arithmetic overflow")]
    Overflow,

    /// The result would be negative where only non-negative values are valid.
    #[error("arithmetic underflow")]
    Underflow,

    /// A proportion had a zero denominator.
    #[error("division by zero")]
    DivisionByZero,
}

/// Result type for arithmetic operations.
pub type ArithmeticResult<T> = Result<T, ArithmeticError>;

/// Truncates `value` toward zero at `scale` fractional digits and pins the
/// scale, so `160` becomes `160.00`.
///
/// Shares are always truncated; the cents this drops go to the platform.
#[inline]
#[must_use]
pub fn truncate_to_scale(value: Decimal, scale: u32) -> Decimal {
    let mut truncated = value.round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    truncated.rescale(scale);
    truncated
}

/// Computes `value * numerator / denominator` without rounding.
///
/// # Errors
///
/// Returns `ArithmeticError::DivisionByZero` for a zero denominator and
/// `ArithmeticError::Overflow` if the product does not fit.
pub fn proportion(value: Decimal, numerator: u32, denominator: u32) -> ArithmeticResult<Decimal> {
    if denominator == 0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    value
        .checked_mul(Decimal::from(numerator))
        .and_then(|product| product.checked_div(Decimal::from(denominator)))
        .ok_or(ArithmeticError::Overflow)
}

/// Adds two decimals.
///
/// # Errors
///
/// Returns `ArithmeticError::Overflow` on overflow.
#[inline]
pub fn add(lhs: Decimal, rhs: Decimal) -> ArithmeticResult<Decimal> {
    lhs.checked_add(rhs).ok_or(ArithmeticError::Overflow)
}

/// Subtracts `rhs`, refusing a negative result.
///
/// # Errors
///
/// Returns `ArithmeticError::Underflow` if `rhs > lhs`.
#[inline]
pub fn sub_non_negative(lhs: Decimal, rhs: Decimal) -> ArithmeticResult<Decimal> {
    if rhs > lhs {
        return Err(ArithmeticError::Underflow);
    }
    lhs.checked_sub(rhs).ok_or(ArithmeticError::Underflow)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn truncation_drops_fractions_of_a_cent() {
        assert_eq!(truncate_to_scale(Decimal::new(199_999, 4), 2), Decimal::new(1999, 2));
        assert_eq!(truncate_to_scale(Decimal::new(-199_999, 4), 2), Decimal::new(-1999, 2));
    }

    #[test]
    fn truncation_pins_scale() {
        let value = truncate_to_scale(Decimal::new(160, 0), 2);
        assert_eq!(value.scale(), 2);
        assert_eq!(value.to_string(), "160.00");
    }

    #[test]
    fn proportion_of_basis_points() {
        let sale = Decimal::new(33_333, 2);
        let raw = proportion(sale, 333, 10_000).unwrap();
        assert_eq!(truncate_to_scale(raw, 2), Decimal::new(1109, 2));
        assert_eq!(proportion(sale, 1, 0), Err(ArithmeticError::DivisionByZero));
        assert_eq!(proportion(Decimal::MAX, 2, 1), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn add_and_subtract() {
        let a = Decimal::new(100, 0);
        let b = Decimal::new(40, 0);
        assert_eq!(add(a, b).unwrap(), Decimal::new(140, 0));
        assert_eq!(sub_non_negative(a, b).unwrap(), Decimal::new(60, 0));
        assert_eq!(sub_non_negative(b, a), Err(ArithmeticError::Underflow));
        assert_eq!(add(Decimal::MAX, Decimal::ONE), Err(ArithmeticError::Overflow));
    }
}
