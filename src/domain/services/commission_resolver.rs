//! # Commission Resolver
//!
//! Determines the rate that applies to a sale and splits the sale amount
//! between the seller, the referring support structures and the platform.
//!
//! # Rate Precedence
//!
//! 1. Custom rate of the primary referrer active at the sale time
//! 2. Category override for the sale's category
//! 3. Volume tier selected by the primary referrer's trailing volume
//!
//! # Split Arithmetic
//!
//! All shares are integer basis points; amounts are truncated to whole cents.
//! The support pool is divided among referrers by their pool share. Pool
//! share nobody claimed returns to the seller. Every rounding remainder
//! goes to the platform, so:
//!
//! - the basis points of all parties sum to exactly 10000
//! - the amounts of all parties sum to exactly the sale amount
//! - the seller and support shares are never rounded up
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::domain::entities::{CommissionTier, RatePair, RateTable, ReferralSplit, SaleEvent};
//! use settlement_ledger::domain::services::commission_resolver::{CommissionResolver, ResolverConfig};
//! use settlement_ledger::domain::value_objects::*;
//! use std::collections::HashMap;
//!
//! let tiers = vec![
//!     CommissionTier::new(Amount::ZERO, Some("10000".parse().unwrap()), RatePair::from_bps(800, 500).unwrap()),
//!     CommissionTier::new("10000".parse().unwrap(), None, RatePair::from_bps(1000, 400).unwrap()),
//! ];
//! let table = RateTable::new(tiers, vec![], vec![]).unwrap();
//! let resolver = CommissionResolver::new(table, ResolverConfig::new(PartyId::new("platform")));
//!
//! let sale = SaleEvent {
//!     sale_id: TransactionId::new_v4(),
//!     seller: PartyId::new("startup"),
//!     referrals: ReferralSplit::single(PartyId::new("incubator")),
//!     category: None,
//!     amount: "2000".parse().unwrap(),
//!     currency: Currency::usd(),
//!     occurred_at: Timestamp::now(),
//! };
//! let approved: HashMap<PartyId, PartyKind> = [
//!     ("startup", PartyKind::Seller),
//!     ("incubator", PartyKind::SupportStructure),
//!     ("platform", PartyKind::Platform),
//! ]
//! .into_iter()
//! .map(|(id, kind)| (PartyId::new(id), kind))
//! .collect();
//!
//! let split = resolver.split(&sale, "9000".parse().unwrap(), &approved).unwrap();
//! assert_eq!(split.seller().amount.to_string(), "1740.00");
//! assert_eq!(split.supports()[0].amount.to_string(), "160.00");
//! assert_eq!(split.platform().amount.to_string(), "100.00");
//! ```

use crate::domain::entities::rate_table::{CategoryRate, CommissionTier, CustomRate, RatePair, RateTable};
use crate::domain::entities::sale::SaleEvent;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Amount, BasisPoints, PartyId, PartyKind, RateSource, Timestamp};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Answers whether a party may take part in a new sale, and in which role.
pub trait ApprovalCheck {
    /// Returns the kind of the party if it is approved, `None` otherwise.
    fn approved_kind(&self, party_id: &PartyId) -> Option<PartyKind>;

    /// Returns true if the party is approved.
    fn is_approved(&self, party_id: &PartyId) -> bool {
        self.approved_kind(party_id).is_some()
    }
}

impl ApprovalCheck for HashMap<PartyId, PartyKind> {
    fn approved_kind(&self, party_id: &PartyId) -> Option<PartyKind> {
        self.get(party_id).copied()
    }
}

/// Resolver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Party credited with the platform share.
    pub platform_party: PartyId,
    /// Adds the current sale to the trailing volume before tier lookup.
    pub include_current_sale_in_volume: bool,
}

impl ResolverConfig {
    /// Creates a config that looks tiers up on prior volume only.
    #[must_use]
    pub fn new(platform_party: PartyId) -> Self {
        Self {
            platform_party,
            include_current_sale_in_volume: false,
        }
    }

    /// Sets whether the current sale counts towards tier volume.
    #[must_use]
    pub fn with_current_sale_in_volume(mut self, include: bool) -> Self {
        self.include_current_sale_in_volume = include;
        self
    }
}

/// The rate picked for a sale and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRate {
    /// Support and platform shares.
    pub rate: RatePair,
    /// Which rule produced it.
    pub source: RateSource,
}

/// One party's part of a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyShare {
    /// The credited party.
    pub party_id: PartyId,
    /// Share of the sale in basis points.
    pub bps: BasisPoints,
    /// Credited amount.
    pub amount: Amount,
}

/// The complete division of one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResult {
    resolved: ResolvedRate,
    seller: PartyShare,
    supports: Vec<PartyShare>,
    platform: PartyShare,
}

impl SplitResult {
    /// Returns the applied rate.
    #[must_use]
    pub fn resolved(&self) -> ResolvedRate {
        self.resolved
    }

    /// Returns the seller's share.
    #[must_use]
    pub fn seller(&self) -> &PartyShare {
        &self.seller
    }

    /// Returns the support structures' shares in referral order.
    #[must_use]
    pub fn supports(&self) -> &[PartyShare] {
        &self.supports
    }

    /// Returns the platform share.
    #[must_use]
    pub fn platform(&self) -> &PartyShare {
        &self.platform
    }

    /// Iterates over the shares paid out as commissions.
    pub fn commissions(&self) -> impl Iterator<Item = &PartyShare> {
        self.supports.iter().chain(std::iter::once(&self.platform))
    }

    /// Returns the sum of all basis points (always 10000).
    #[must_use]
    pub fn total_bps(&self) -> u32 {
        self.seller.bps.as_u32()
            + self.platform.bps.as_u32()
            + self.supports.iter().map(|s| s.bps.as_u32()).sum::<u32>()
    }

    /// Returns the sum of all amounts (always the sale amount).
    ///
    /// # Errors
    ///
    /// Returns an arithmetic error on overflow.
    pub fn total_amount(&self) -> DomainResult<Amount> {
        let total = std::iter::once(&self.seller)
            .chain(self.commissions())
            .try_fold(Amount::ZERO, |acc, share| acc.checked_add(share.amount))?;
        Ok(total)
    }
}

/// Resolves rates and splits sales against a mutable rate table.
///
/// Rate writes are validated before they become visible, and every
/// resolution reads one consistent snapshot of the table.
pub struct CommissionResolver {
    table: RwLock<RateTable>,
    config: ResolverConfig,
}

impl fmt::Debug for CommissionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommissionResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommissionResolver {
    /// Creates a resolver over a validated table.
    #[must_use]
    pub fn new(table: RateTable, config: ResolverConfig) -> Self {
        Self {
            table: RwLock::new(table),
            config,
        }
    }

    /// Returns the resolver settings.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the platform party.
    #[must_use]
    pub fn platform_party(&self) -> &PartyId {
        &self.config.platform_party
    }

    /// Returns a copy of the current table.
    #[must_use]
    pub fn snapshot(&self) -> RateTable {
        self.table.read().clone()
    }

    /// Inserts or replaces a category override.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the category is blank.
    pub fn set_category_rate(&self, entry: CategoryRate) -> DomainResult<()> {
        self.table.write().set_category_rate(entry)
    }

    /// Adds a custom rate window.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if it overlaps an existing window.
    pub fn add_custom_rate(&self, rate: CustomRate) -> DomainResult<()> {
        self.table.write().add_custom_rate(rate)
    }

    /// Replaces the tier table.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if the tiers are malformed; the old
    /// table stays in place.
    pub fn replace_tiers(&self, tiers: Vec<CommissionTier>) -> DomainResult<()> {
        self.table.write().replace_tiers(tiers)
    }

    /// Picks the rate for a sale.
    ///
    /// `volume` is the primary referrer's trailing volume as the tier lookup
    /// should see it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if no tier covers `volume`.
    pub fn resolve_rate(
        &self,
        primary: Option<&PartyId>,
        category: Option<&str>,
        volume: Amount,
        at: Timestamp,
    ) -> DomainResult<ResolvedRate> {
        let table = self.table.read();
        resolve_in(&table, primary, category, volume, at)
    }

    /// Splits a sale.
    ///
    /// # Errors
    ///
    /// - `DomainError::NoApprovedParty` if the seller, any referrer or the
    ///   platform is not approved
    /// - `DomainError::ValidationError` if a referrer is not a support
    ///   structure
    /// - `DomainError::Integrity` if the table has no tier for the volume
    /// - `DomainError::Arithmetic` on overflow
    pub fn split(
        &self,
        sale: &SaleEvent,
        trailing_volume: Amount,
        approvals: &impl ApprovalCheck,
    ) -> DomainResult<SplitResult> {
        let participants = std::iter::once(&sale.seller)
            .chain(sale.referrals.party_ids())
            .chain(std::iter::once(&self.config.platform_party));
        for party in participants {
            if !approvals.is_approved(party) {
                return Err(DomainError::NoApprovedParty(party.clone()));
            }
        }
        if let Some(referrer) = sale
            .referrals
            .party_ids()
            .find(|p| {
                **p == sale.seller
                    || approvals.approved_kind(p) != Some(PartyKind::SupportStructure)
            })
        {
            return Err(DomainError::validation(format!(
                "referrer {referrer} is not a support structure"
            )));
        }

        let volume = if self.config.include_current_sale_in_volume {
            trailing_volume.checked_add(sale.amount)?
        } else {
            trailing_volume
        };

        let resolved = self.resolve_rate(
            sale.referrals.primary(),
            sale.category.as_deref(),
            volume,
            sale.occurred_at,
        )?;
        debug!(
            sale_id = %sale.sale_id,
            source = %resolved.source,
            support_bps = resolved.rate.support_bps().as_u32(),
            platform_bps = resolved.rate.platform_bps().as_u32(),
            volume = %volume,
            "Resolved commission rate"
        );

        split_amount(sale, resolved, &self.config.platform_party)
    }
}

fn resolve_in(
    table: &RateTable,
    primary: Option<&PartyId>,
    category: Option<&str>,
    volume: Amount,
    at: Timestamp,
) -> DomainResult<ResolvedRate> {
    if let Some(custom) = primary.and_then(|p| table.custom_rate(p, at)) {
        return Ok(ResolvedRate {
            rate: custom.rate(),
            source: RateSource::Custom,
        });
    }
    if let Some(rate) = category.and_then(|c| table.category_rate(c)) {
        return Ok(ResolvedRate {
            rate,
            source: RateSource::Category,
        });
    }
    let tier = table.tiers().tier_for(volume).ok_or_else(|| {
        DomainError::integrity(format!("no commission tier covers volume {volume}"))
    })?;
    Ok(ResolvedRate {
        rate: tier.rate(),
        source: RateSource::Tier,
    })
}

fn split_amount(sale: &SaleEvent, resolved: ResolvedRate, platform: &PartyId) -> DomainResult<SplitResult> {
    let pool = resolved.rate.support_bps();
    let unassigned = sale.referrals.assigned().complement();

    // base seller share plus the part of the pool nobody claimed
    let seller_bps = BasisPoints::new(resolved.rate.seller_bps().as_u32() + unassigned.of(pool).as_u32())?;
    let seller_amount = sale.amount.share(seller_bps)?;

    let pool_amount = sale.amount.share(pool)?;
    let mut supports = Vec::with_capacity(sale.referrals.referrals().len());
    for referral in sale.referrals.referrals() {
        supports.push(PartyShare {
            party_id: referral.party_id.clone(),
            bps: referral.pool_share.of(pool),
            amount: pool_amount.share(referral.pool_share)?,
        });
    }

    let support_bps: u32 = supports.iter().map(|s| s.bps.as_u32()).sum();
    let platform_bps = BasisPoints::FULL
        .checked_sub(seller_bps)
        .and_then(|rest| rest.checked_sub(BasisPoints::new(support_bps).ok()?))
        .ok_or_else(|| DomainError::integrity("split basis points exceed 10000"))?;

    let distributed = supports
        .iter()
        .try_fold(seller_amount, |acc, share| acc.checked_add(share.amount))?;
    let platform_amount = sale.amount.checked_sub(distributed).map_err(|_| {
        DomainError::CommissionExceedsSale {
            commissions: distributed.to_string(),
            sale: sale.amount.to_string(),
        }
    })?;

    Ok(SplitResult {
        resolved,
        seller: PartyShare {
            party_id: sale.seller.clone(),
            bps: seller_bps,
            amount: seller_amount,
        },
        supports,
        platform: PartyShare {
            party_id: platform.clone(),
            bps: platform_bps,
            amount: platform_amount,
        },
    })
}
