//! # Sales and Referral Splits
//!
//! A [`SaleEvent`] is the input to settlement: one completed sale with its
//! referring support structures. Settling it produces a [`SaleGroup`], the
//! set of transactions committed atomically to the ledger.

use crate::domain::entities::transaction::Transaction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    Amount, BasisPoints, Currency, PartyId, Timestamp, TransactionId, TransactionType,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One referring support structure and its share of the support pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    /// The referring support structure.
    pub party_id: PartyId,
    /// Share of the support pool, in basis points of the pool.
    pub pool_share: BasisPoints,
}

/// Ordered list of referrers. The first entry is the primary referrer whose
/// custom rate and trailing volume drive rate resolution.
///
/// # Invariants
///
/// - no duplicate referrers
/// - pool shares sum to at most 100 %
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Referral>", into = "Vec<Referral>")]
pub struct ReferralSplit(Vec<Referral>);

impl ReferralSplit {
    /// Builds a validated split.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` on duplicate referrers and
    /// `DomainError::InvalidBasisPoints` if the shares exceed the pool.
    pub fn new(referrals: Vec<Referral>) -> DomainResult<Self> {
        let mut seen = HashSet::with_capacity(referrals.len());
        let mut total: u32 = 0;
        for referral in &referrals {
            if referral.party_id.is_blank() {
                return Err(DomainError::validation("referrer id must not be blank"));
            }
            if !seen.insert(&referral.party_id) {
                return Err(DomainError::validation(format!(
                    "duplicate referrer {}",
                    referral.party_id
                )));
            }
            total = total.saturating_add(referral.pool_share.as_u32());
        }
        BasisPoints::new(total)?;
        Ok(Self(referrals))
    }

    /// A sale with no referrer.
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// A single referrer taking the whole pool.
    #[must_use]
    pub fn single(party_id: PartyId) -> Self {
        Self(vec![Referral {
            party_id,
            pool_share: BasisPoints::FULL,
        }])
    }

    /// Returns the primary referrer.
    #[must_use]
    pub fn primary(&self) -> Option<&PartyId> {
        self.0.first().map(|r| &r.party_id)
    }

    /// Returns the referrals in order.
    #[must_use]
    pub fn referrals(&self) -> &[Referral] {
        &self.0
    }

    /// Returns the sum of all pool shares.
    #[must_use]
    pub fn assigned(&self) -> BasisPoints {
        let total = self.0.iter().map(|r| r.pool_share.as_u32()).sum::<u32>();
        // bounded at construction
        BasisPoints::new(total).unwrap_or(BasisPoints::FULL)
    }

    /// Returns true if nobody referred the sale.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the referrer ids.
    pub fn party_ids(&self) -> impl Iterator<Item = &PartyId> {
        self.0.iter().map(|r| &r.party_id)
    }
}

impl TryFrom<Vec<Referral>> for ReferralSplit {
    type Error = DomainError;

    fn try_from(value: Vec<Referral>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReferralSplit> for Vec<Referral> {
    fn from(split: ReferralSplit) -> Self {
        split.0
    }
}

/// A completed sale awaiting settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEvent {
    /// Ledger id for the sale credit; reusing it is rejected by the ledger.
    pub sale_id: TransactionId,
    /// The selling party.
    pub seller: PartyId,
    /// Referring support structures.
    #[serde(default)]
    pub referrals: ReferralSplit,
    /// Product category, if any.
    #[serde(default)]
    pub category: Option<String>,
    /// Gross sale amount.
    pub amount: Amount,
    /// Sale currency.
    pub currency: Currency,
    /// When the sale completed.
    pub occurred_at: Timestamp,
}

/// The transactions produced by settling one sale, committed as a unit.
///
/// # Invariants
///
/// - exactly one sale transaction
/// - every commission references the sale and shares its currency
/// - commissions sum to at most the sale amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleGroup {
    sale: Transaction,
    commissions: Vec<Transaction>,
    referrers: Vec<PartyId>,
}

impl SaleGroup {
    /// Assembles and validates a group.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if the transactions are inconsistent
    /// and `DomainError::CommissionExceedsSale` if the commissions outgrow the
    /// sale.
    pub fn new(
        sale: Transaction,
        commissions: Vec<Transaction>,
        referrers: Vec<PartyId>,
    ) -> DomainResult<Self> {
        if sale.kind() != TransactionType::Sale {
            return Err(DomainError::integrity("group must start with a sale"));
        }
        for commission in &commissions {
            if commission.kind() != TransactionType::Commission {
                return Err(DomainError::integrity(format!(
                    "transaction {} is not a commission",
                    commission.id()
                )));
            }
            if commission.sale_reference() != Some(sale.id()) {
                return Err(DomainError::integrity(format!(
                    "commission {} does not reference sale {}",
                    commission.id(),
                    sale.id()
                )));
            }
            if commission.currency() != sale.currency() {
                return Err(DomainError::integrity(format!(
                    "commission {} currency {} differs from sale currency {}",
                    commission.id(),
                    commission.currency(),
                    sale.currency()
                )));
            }
        }
        let distributed = sum_amounts(&commissions)?;
        if distributed > sale.amount() {
            return Err(DomainError::CommissionExceedsSale {
                commissions: distributed.to_string(),
                sale: sale.amount().to_string(),
            });
        }
        Ok(Self {
            sale,
            commissions,
            referrers,
        })
    }

    /// Returns the sale credit.
    #[must_use]
    pub fn sale(&self) -> &Transaction {
        &self.sale
    }

    /// Returns the commission credits.
    #[must_use]
    pub fn commissions(&self) -> &[Transaction] {
        &self.commissions
    }

    /// Returns the referring support structures.
    #[must_use]
    pub fn referrers(&self) -> &[PartyId] {
        &self.referrers
    }

    /// Returns the total distributed as commissions.
    #[must_use]
    pub fn distributed(&self) -> Amount {
        // bounded by the sale amount at construction
        sum_amounts(&self.commissions).unwrap_or(Amount::ZERO)
    }

    /// Returns every party touched by the group, sorted and deduplicated.
    #[must_use]
    pub fn party_ids(&self) -> Vec<PartyId> {
        let mut ids: Vec<PartyId> = std::iter::once(self.sale.party_id().clone())
            .chain(self.commissions.iter().map(|c| c.party_id().clone()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Iterates over all transactions, sale first.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        std::iter::once(&self.sale).chain(self.commissions.iter())
    }

    /// Consumes the group.
    #[must_use]
    pub fn into_parts(self) -> (Transaction, Vec<Transaction>, Vec<PartyId>) {
        (self.sale, self.commissions, self.referrers)
    }
}

fn sum_amounts(transactions: &[Transaction]) -> DomainResult<Amount> {
    let total = transactions
        .iter()
        .try_fold(Amount::ZERO, |acc, tx| acc.checked_add(tx.amount()))?;
    Ok(total)
}
