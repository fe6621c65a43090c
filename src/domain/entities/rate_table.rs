//! # Commission Rate Table
//!
//! The configuration the commission resolver reads from: volume tiers,
//! per-category overrides and per-support-structure custom rates.
//!
//! Every structural rule is checked when the table (or an entry) is written,
//! so resolution never meets a malformed table.
//!
//! # Tiers
//!
//! Tiers are half-open volume bands `[min_volume, max_volume)`. The first
//! band starts at zero, each band starts where the previous one ends, and the
//! last band is unbounded:
//!
//! ```text
//! [0, 10000) → 8% / 5%
//! [10000, ∞) → 10% / 5%
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Amount, BasisPoints, PartyId, Timestamp};
use serde::Serialize;
use std::collections::HashMap;

/// Support and platform shares of a sale. The seller keeps the complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePair {
    support_bps: BasisPoints,
    platform_bps: BasisPoints,
}

impl RatePair {
    /// Creates a rate pair.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if the shares exceed 100 %.
    pub fn new(support_bps: BasisPoints, platform_bps: BasisPoints) -> DomainResult<Self> {
        if support_bps.checked_add(platform_bps).is_none() {
            return Err(DomainError::integrity(format!(
                "support {support_bps} + platform {platform_bps} exceeds 10000bps"
            )));
        }
        Ok(Self {
            support_bps,
            platform_bps,
        })
    }

    /// Creates a rate pair from raw basis points.
    ///
    /// # Errors
    ///
    /// Returns an error if either value or their sum exceeds 10000.
    pub fn from_bps(support: u32, platform: u32) -> DomainResult<Self> {
        Self::new(BasisPoints::new(support)?, BasisPoints::new(platform)?)
    }

    /// Returns the support structure pool.
    #[inline]
    #[must_use]
    pub fn support_bps(&self) -> BasisPoints {
        self.support_bps
    }

    /// Returns the platform fee.
    #[inline]
    #[must_use]
    pub fn platform_bps(&self) -> BasisPoints {
        self.platform_bps
    }

    /// Returns the seller share, `10000 - support - platform`.
    #[must_use]
    pub fn seller_bps(&self) -> BasisPoints {
        self.support_bps
            .checked_add(self.platform_bps)
            .map(BasisPoints::complement)
            .unwrap_or(BasisPoints::ZERO)
    }
}

/// A volume band and the rate that applies inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTier {
    min_volume: Amount,
    max_volume: Option<Amount>,
    rate: RatePair,
}

impl CommissionTier {
    /// Creates a tier covering `[min_volume, max_volume)`.
    #[must_use]
    pub fn new(min_volume: Amount, max_volume: Option<Amount>, rate: RatePair) -> Self {
        Self {
            min_volume,
            max_volume,
            rate,
        }
    }

    /// Returns the inclusive lower bound.
    #[inline]
    #[must_use]
    pub fn min_volume(&self) -> Amount {
        self.min_volume
    }

    /// Returns the exclusive upper bound; `None` for the top tier.
    #[inline]
    #[must_use]
    pub fn max_volume(&self) -> Option<Amount> {
        self.max_volume
    }

    /// Returns the rate.
    #[inline]
    #[must_use]
    pub fn rate(&self) -> RatePair {
        self.rate
    }

    /// Returns true if `volume` falls inside the band.
    #[must_use]
    pub fn contains(&self, volume: Amount) -> bool {
        volume >= self.min_volume && self.max_volume.is_none_or(|max| volume < max)
    }
}

/// A validated, gap-free list of tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TierTable(Vec<CommissionTier>);

impl TierTable {
    /// Validates and sorts the tiers.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if the table is empty, does not start
    /// at zero, has gaps or overlaps, contains an empty band, or its last
    /// band is bounded.
    pub fn new(mut tiers: Vec<CommissionTier>) -> DomainResult<Self> {
        tiers.sort_by_key(CommissionTier::min_volume);

        let first = tiers
            .first()
            .ok_or_else(|| DomainError::integrity("tier table must not be empty"))?;
        if !first.min_volume.is_zero() {
            return Err(DomainError::integrity(format!(
                "first tier must start at 0, starts at {}",
                first.min_volume
            )));
        }

        for pair in tiers.windows(2) {
            let [lower, upper] = pair else { continue };
            match lower.max_volume {
                Some(max) if max == upper.min_volume => {}
                Some(max) => {
                    return Err(DomainError::integrity(format!(
                        "tier ending at {max} is not followed by a tier starting there (next starts at {})",
                        upper.min_volume
                    )));
                }
                None => {
                    return Err(DomainError::integrity(format!(
                        "unbounded tier starting at {} must be last",
                        lower.min_volume
                    )));
                }
            }
        }

        for tier in &tiers {
            if let Some(max) = tier.max_volume {
                if max <= tier.min_volume {
                    return Err(DomainError::integrity(format!(
                        "tier [{}, {max}) is empty",
                        tier.min_volume
                    )));
                }
            }
        }

        if tiers.last().is_some_and(|t| t.max_volume.is_some()) {
            return Err(DomainError::integrity("last tier must be unbounded"));
        }

        Ok(Self(tiers))
    }

    /// Returns the tier containing `volume`.
    ///
    /// A validated table covers every non-negative volume, so this always
    /// finds a tier.
    #[must_use]
    pub fn tier_for(&self, volume: Amount) -> Option<&CommissionTier> {
        self.0.iter().find(|t| t.contains(volume))
    }

    /// Returns the tiers in ascending order.
    #[must_use]
    pub fn tiers(&self) -> &[CommissionTier] {
        &self.0
    }
}

/// A rate override for a product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRate {
    /// Category key, compared case-insensitively.
    pub category: String,
    /// The rate.
    pub rate: RatePair,
}

/// A rate negotiated with one support structure for a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRate {
    support_structure: PartyId,
    rate: RatePair,
    effective_from: Timestamp,
    effective_until: Option<Timestamp>,
}

impl CustomRate {
    /// Creates a custom rate active over `[effective_from, effective_until)`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` if the window is empty.
    pub fn new(
        support_structure: PartyId,
        rate: RatePair,
        effective_from: Timestamp,
        effective_until: Option<Timestamp>,
    ) -> DomainResult<Self> {
        if effective_until.is_some_and(|until| !until.is_after(&effective_from)) {
            return Err(DomainError::validation(
                "custom rate window must end after it starts",
            ));
        }
        Ok(Self {
            support_structure,
            rate,
            effective_from,
            effective_until,
        })
    }

    /// Returns the support structure.
    #[inline]
    #[must_use]
    pub fn support_structure(&self) -> &PartyId {
        &self.support_structure
    }

    /// Returns the rate.
    #[inline]
    #[must_use]
    pub fn rate(&self) -> RatePair {
        self.rate
    }

    /// Returns when the rate starts applying.
    #[inline]
    #[must_use]
    pub fn effective_from(&self) -> Timestamp {
        self.effective_from
    }

    /// Returns when the rate stops applying, if ever.
    #[inline]
    #[must_use]
    pub fn effective_until(&self) -> Option<Timestamp> {
        self.effective_until
    }

    /// Returns true if the rate applies at `at`.
    #[must_use]
    pub fn is_active_at(&self, at: Timestamp) -> bool {
        !at.is_before(&self.effective_from) && self.effective_until.is_none_or(|until| at.is_before(&until))
    }

    fn overlaps(&self, other: &Self) -> bool {
        let starts_before_other_ends = other
            .effective_until
            .is_none_or(|until| self.effective_from.is_before(&until));
        let ends_after_other_starts = self
            .effective_until
            .is_none_or(|until| other.effective_from.is_before(&until));
        starts_before_other_ends && ends_after_other_starts
    }
}

/// The full rate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    tiers: TierTable,
    categories: HashMap<String, RatePair>,
    custom_rates: HashMap<PartyId, Vec<CustomRate>>,
}

impl RateTable {
    /// Builds a table, validating every entry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` on malformed tiers or overlapping
    /// custom rate windows, and `DomainError::ValidationError` on blank or
    /// duplicate category keys.
    pub fn new(
        tiers: Vec<CommissionTier>,
        categories: Vec<CategoryRate>,
        custom_rates: Vec<CustomRate>,
    ) -> DomainResult<Self> {
        let mut table = Self {
            tiers: TierTable::new(tiers)?,
            categories: HashMap::with_capacity(categories.len()),
            custom_rates: HashMap::new(),
        };
        for entry in categories {
            let key = category_key(&entry.category)?;
            if table.categories.insert(key, entry.rate).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate category {}",
                    entry.category
                )));
            }
        }
        for rate in custom_rates {
            table.add_custom_rate(rate)?;
        }
        Ok(table)
    }

    /// Replaces the tier table.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if the tiers are malformed.
    pub fn replace_tiers(&mut self, tiers: Vec<CommissionTier>) -> DomainResult<()> {
        self.tiers = TierTable::new(tiers)?;
        Ok(())
    }

    /// Inserts or replaces a category override.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` if the category is blank.
    pub fn set_category_rate(&mut self, entry: CategoryRate) -> DomainResult<()> {
        let key = category_key(&entry.category)?;
        self.categories.insert(key, entry.rate);
        Ok(())
    }

    /// Adds a custom rate window.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if the window overlaps an existing one
    /// for the same support structure.
    pub fn add_custom_rate(&mut self, rate: CustomRate) -> DomainResult<()> {
        let windows = self
            .custom_rates
            .entry(rate.support_structure.clone())
            .or_default();
        if let Some(existing) = windows.iter().find(|w| w.overlaps(&rate)) {
            return Err(DomainError::integrity(format!(
                "custom rate for {} starting {} overlaps window starting {}",
                rate.support_structure, rate.effective_from, existing.effective_from
            )));
        }
        windows.push(rate);
        windows.sort_by_key(CustomRate::effective_from);
        Ok(())
    }

    /// Returns the tier table.
    #[must_use]
    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Returns the override for `category`, if any.
    #[must_use]
    pub fn category_rate(&self, category: &str) -> Option<RatePair> {
        self.categories
            .get(&category.trim().to_lowercase())
            .copied()
    }

    /// Returns the custom rate of `support_structure` active at `at`.
    #[must_use]
    pub fn custom_rate(&self, support_structure: &PartyId, at: Timestamp) -> Option<&CustomRate> {
        self.custom_rates
            .get(support_structure)?
            .iter()
            .find(|w| w.is_active_at(at))
    }

    /// Returns every custom rate window of `support_structure`.
    #[must_use]
    pub fn custom_rates_for(&self, support_structure: &PartyId) -> &[CustomRate] {
        self.custom_rates
            .get(support_structure)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the category overrides.
    #[must_use]
    pub fn categories(&self) -> &HashMap<String, RatePair> {
        &self.categories
    }
}

fn category_key(category: &str) -> DomainResult<String> {
    let key = category.trim().to_lowercase();
    if key.is_empty() {
        return Err(DomainError::validation("category must not be blank"));
    }
    Ok(key)
}
