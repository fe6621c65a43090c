//! # Money
//!
//! Fixed-point monetary amounts and currency codes.
//!
//! [`Amount`] wraps a [`Decimal`] quantized to [`MINOR_UNIT_SCALE`] digits
//! (cents). Amounts are never negative; debits are expressed by transaction
//! type, not by sign.
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::domain::value_objects::money::Amount;
//! use settlement_ledger::domain::value_objects::basis_points::BasisPoints;
//!
//! let sale = Amount::from_minor(200_000); // 2,000.00
//! let support = sale.share(BasisPoints::from_percent(8).unwrap()).unwrap();
//! assert_eq!(support, Amount::from_minor(16_000));
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::arithmetic::{
    ArithmeticResult, add, proportion, sub_non_negative, truncate_to_scale,
};
use crate::domain::value_objects::basis_points::BasisPoints;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits carried by every amount.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// A non-negative monetary amount with cent precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates an amount from a decimal value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the value is negative or has
    /// more than [`MINOR_UNIT_SCALE`] significant fractional digits.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::InvalidAmount(format!(
                "{value} is negative"
            )));
        }
        let normalized = value.normalize();
        if normalized.scale() > MINOR_UNIT_SCALE {
            return Err(DomainError::InvalidAmount(format!(
                "{value} has more than {MINOR_UNIT_SCALE} decimal places"
            )));
        }
        Ok(Self(truncate_to_scale(normalized, MINOR_UNIT_SCALE)))
    }

    /// Creates a strictly positive amount.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the value is zero, negative or
    /// too precise.
    pub fn positive(value: Decimal) -> DomainResult<Self> {
        let amount = Self::new(value)?;
        if amount.is_zero() {
            return Err(DomainError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }
        Ok(amount)
    }

    /// Creates an amount from minor units (cents). Negative input clamps to zero.
    #[must_use]
    pub fn from_minor(minor: i64) -> Self {
        let mut value = Decimal::from(minor.max(0));
        value.set_scale(MINOR_UNIT_SCALE).unwrap_or_default();
        Self(value)
    }

    /// Returns the underlying decimal.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds two amounts.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticError::Overflow` on overflow.
    pub fn checked_add(self, rhs: Self) -> ArithmeticResult<Self> {
        add(self.0, rhs.0).map(Self)
    }

    /// Subtracts `rhs`, refusing to go below zero.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticError::Underflow` if `rhs > self`.
    pub fn checked_sub(self, rhs: Self) -> ArithmeticResult<Self> {
        sub_non_negative(self.0, rhs.0).map(Self)
    }

    /// Sums a sequence of amounts.
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticError::Overflow` on overflow.
    pub fn checked_sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> ArithmeticResult<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(*amount))
    }

    /// Subtracts `rhs`, flooring at zero.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        self.checked_sub(rhs).unwrap_or(Self::ZERO)
    }

    /// Returns `bps` of this amount, truncated to whole cents.
    ///
    /// # Errors
    ///
    /// Returns an arithmetic error on overflow.
    pub fn share(self, bps: BasisPoints) -> ArithmeticResult<Self> {
        let raw = proportion(self.0, bps.as_u32(), BasisPoints::FULL.as_u32())?;
        Ok(Self(truncate_to_scale(raw, MINOR_UNIT_SCALE)))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| DomainError::InvalidAmount(format!("'{s}' is not a decimal")))?;
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from a three-letter code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCurrency` for anything other than three
    /// ASCII letters.
    pub fn new(code: &str) -> DomainResult<Self> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// US dollar.
    #[must_use]
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    /// Euro.
    #[must_use]
    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    /// Returns the code.
    #[inline]
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
