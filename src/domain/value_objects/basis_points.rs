//! # Basis Points
//!
//! Integer percentages with 1/100 % resolution. All commission math is
//! carried out in basis points so splits never drift.

use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A share expressed in basis points, `0..=10_000`.
///
/// # Examples
///
/// ```
/// use settlement_ledger::domain::value_objects::basis_points::BasisPoints;
///
/// let support = BasisPoints::from_percent(8).unwrap();
/// let platform = BasisPoints::from_percent(5).unwrap();
/// let seller = BasisPoints::FULL
///     .checked_sub(support.checked_add(platform).unwrap())
///     .unwrap();
/// assert_eq!(seller.as_u32(), 8_700);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BasisPoints(u32);

impl BasisPoints {
    /// Zero basis points.
    pub const ZERO: Self = Self(0);

    /// 100 %.
    pub const FULL: Self = Self(10_000);

    /// Creates a value, rejecting anything above 100 %.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBasisPoints` if `bps > 10_000`.
    pub fn new(bps: u32) -> DomainResult<Self> {
        if bps > Self::FULL.0 {
            return Err(DomainError::InvalidBasisPoints(bps));
        }
        Ok(Self(bps))
    }

    /// Creates a value from whole percent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBasisPoints` if `percent > 100`.
    pub fn from_percent(percent: u32) -> DomainResult<Self> {
        Self::new(percent.saturating_mul(100))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Adds two shares; `None` if the sum exceeds 100 %.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(|v| Self::new(v).ok())
    }

    /// Subtracts `rhs`; `None` on underflow.
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Returns the complement `100 % - self`.
    #[must_use]
    pub const fn complement(self) -> Self {
        Self(Self::FULL.0 - self.0)
    }

    /// Returns `self` of `whole`, truncated (e.g. 50 % of an 800 bps pool = 400 bps).
    #[must_use]
    pub const fn of(self, whole: Self) -> Self {
        // both operands <= 10_000, so the product fits in u32
        Self(self.0 * whole.0 / Self::FULL.0)
    }
}

impl TryFrom<u32> for BasisPoints {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BasisPoints> for u32 {
    fn from(bps: BasisPoints) -> Self {
        bps.0
    }
}

impl fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_above_full() {
        assert!(BasisPoints::new(10_001).is_err());
        assert!(BasisPoints::from_percent(101).is_err());
        assert_eq!(BasisPoints::new(10_000).unwrap(), BasisPoints::FULL);
    }

    #[test]
    fn checked_add_caps_at_full() {
        let a = BasisPoints::new(6_000).unwrap();
        assert!(a.checked_add(a).is_none());
        assert_eq!(
            a.checked_add(BasisPoints::new(4_000).unwrap()),
            Some(BasisPoints::FULL)
        );
    }

    #[test]
    fn of_scales_pool_shares() {
        let pool = BasisPoints::new(800).unwrap();
        let half = BasisPoints::new(5_000).unwrap();
        assert_eq!(half.of(pool).as_u32(), 400);
        // 1/3 of 1000 bps truncates
        assert_eq!(BasisPoints::new(3_333).unwrap().of(BasisPoints::new(1_000).unwrap()).as_u32(), 333);
    }

    #[test]
    fn complement() {
        assert_eq!(BasisPoints::new(1_300).unwrap().complement().as_u32(), 8_700);
    }

    #[test]
    fn serde_validates() {
        assert!(serde_json::from_str::<BasisPoints>("10001").is_err());
        assert_eq!(serde_json::from_str::<BasisPoints>("800").unwrap().as_u32(), 800);
    }
}
