//! # Settlement Service
//!
//! Turns a sale event into ledger transactions.
//!
//! ```text
//! SaleEvent -> approvals + trailing volume -> CommissionResolver::split
//!           -> SaleGroup (sale + commissions) -> LedgerStore::append_sale
//!           -> SaleSettled event
//! ```
//!
//! Also serves read-only rate previews and validated runtime writes to the
//! rate table.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::rate_table::{CategoryRate, CustomRate, RateTable};
use crate::domain::entities::sale::{SaleEvent, SaleGroup};
use crate::domain::entities::transaction::Transaction;
use crate::domain::events::{CommissionCredit, SaleSettled};
use crate::domain::services::commission_resolver::{
    CommissionResolver, ResolvedRate, SplitResult,
};
use crate::domain::value_objects::{Amount, BasisPoints, PartyId, PartyKind, Timestamp};
use crate::infrastructure::notifications::Notifier;
use crate::infrastructure::persistence::{LedgerStore, PartyRepository};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Settlement settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementConfig {
    /// How long new credits stay pending.
    pub hold_period: Duration,
    /// Trailing window for tier volume.
    pub volume_window_days: i64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            hold_period: Duration::from_secs(3 * 24 * 60 * 60),
            volume_window_days: 30,
        }
    }
}

/// A committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    /// The split that was applied.
    pub split: SplitResult,
    /// The sale transaction.
    pub sale: Transaction,
    /// The commission transactions.
    pub commissions: Vec<Transaction>,
}

/// Read-only answer to a rate preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePreview {
    /// The rate a sale would get now.
    pub resolved: ResolvedRate,
    /// Seller's share in basis points.
    pub seller_bps: BasisPoints,
    /// Trailing volume used for the tier lookup.
    pub trailing_volume: Amount,
    /// Instant of the preview.
    pub as_of: Timestamp,
}

/// Records sales and manages the rate table.
#[derive(Debug)]
pub struct SettlementService {
    resolver: Arc<CommissionResolver>,
    ledger: Arc<dyn LedgerStore>,
    parties: Arc<dyn PartyRepository>,
    notifier: Notifier,
    config: SettlementConfig,
}

impl SettlementService {
    /// Creates a new settlement service.
    #[must_use]
    pub fn new(
        resolver: Arc<CommissionResolver>,
        ledger: Arc<dyn LedgerStore>,
        parties: Arc<dyn PartyRepository>,
        notifier: Notifier,
        config: SettlementConfig,
    ) -> Self {
        Self {
            resolver,
            ledger,
            parties,
            notifier,
            config,
        }
    }

    /// Returns the settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Resolves, splits and atomically records a sale.
    ///
    /// `occurred_at` places the sale in the trailing volume window; the hold
    /// runs from the moment the ledger commits the group, so a backdated sale
    /// is held just as long as a fresh one.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::Validation` for a foreign currency, a sale dated
    ///   in the future or a malformed sale
    /// - `ApplicationError::Domain(NoApprovedParty)` if a participant is not approved
    /// - `ApplicationError::Conflict` if the sale id was already recorded
    #[instrument(skip(self, sale), fields(sale_id = %sale.sale_id, seller = %sale.seller))]
    pub async fn record_sale(&self, sale: SaleEvent) -> ApplicationResult<SaleReceipt> {
        if &sale.currency != self.ledger.currency() {
            return Err(ApplicationError::validation(format!(
                "sale currency {} is not the settlement currency {}",
                sale.currency,
                self.ledger.currency()
            )));
        }
        if sale.amount.is_zero() {
            return Err(ApplicationError::validation("sale amount must be positive"));
        }
        let committed_at = Timestamp::now();
        if sale.occurred_at.is_after(&committed_at) {
            return Err(ApplicationError::validation(format!(
                "sale occurred at {} which is in the future",
                sale.occurred_at
            )));
        }
        let available_at = committed_at.add_duration(self.config.hold_period);

        let approved = self.approved_participants(&sale).await?;
        let trailing_volume = self
            .trailing_volume(sale.referrals.primary(), sale.occurred_at)
            .await?;
        let split = self.resolver.split(&sale, trailing_volume, &approved)?;

        let sale_tx = Transaction::sale(
            sale.sale_id,
            sale.seller.clone(),
            sale.amount,
            sale.currency.clone(),
            sale.occurred_at,
            available_at,
        )?;
        let commissions = split
            .commissions()
            .filter(|share| !share.amount.is_zero())
            .map(|share| {
                Transaction::commission(
                    share.party_id.clone(),
                    sale_tx.id(),
                    share.amount,
                    sale.currency.clone(),
                    sale.occurred_at,
                    available_at,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let referrers: Vec<PartyId> = sale.referrals.party_ids().cloned().collect();

        let group = SaleGroup::new(sale_tx.clone(), commissions.clone(), referrers)?;
        self.ledger.append_sale(group).await?;

        info!(
            amount = %sale.amount,
            source = %split.resolved().source,
            seller_amount = %split.seller().amount,
            platform_amount = %split.platform().amount,
            "Sale settled"
        );

        self.notifier.publish(SaleSettled::new(
            sale.seller.clone(),
            sale_tx.id(),
            sale.amount,
            sale.currency.clone(),
            split.resolved().source,
            commissions
                .iter()
                .map(|c| CommissionCredit {
                    party_id: c.party_id().clone(),
                    amount: c.amount(),
                })
                .collect(),
        ));

        Ok(SaleReceipt {
            split,
            sale: sale_tx,
            commissions,
        })
    }

    /// Previews the rate a sale would get right now.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Domain` if no tier covers the volume.
    pub async fn preview_rate(
        &self,
        support_structure: Option<&PartyId>,
        category: Option<&str>,
    ) -> ApplicationResult<RatePreview> {
        let as_of = Timestamp::now();
        let trailing_volume = self.trailing_volume(support_structure, as_of).await?;
        let resolved = self
            .resolver
            .resolve_rate(support_structure, category, trailing_volume, as_of)?;
        Ok(RatePreview {
            seller_bps: resolved.rate.seller_bps(),
            resolved,
            trailing_volume,
            as_of,
        })
    }

    /// Returns a copy of the current rate table.
    #[must_use]
    pub fn rate_table(&self) -> RateTable {
        self.resolver.snapshot()
    }

    /// Sets or replaces a category override.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Domain` if the category key is blank.
    #[instrument(skip(self, entry), fields(category = %entry.category))]
    pub fn set_category_rate(&self, entry: CategoryRate) -> ApplicationResult<()> {
        self.resolver.set_category_rate(entry)?;
        info!("Category rate updated");
        Ok(())
    }

    /// Adds a negotiated rate for a support structure.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::NotFound` if the support structure is unknown
    /// - `ApplicationError::Validation` if the party is not a support structure
    /// - `ApplicationError::NotApproved` if the party is not approved
    /// - `ApplicationError::Conflict` if the window overlaps an existing one
    #[instrument(skip(self, rate), fields(support_structure = %rate.support_structure()))]
    pub async fn add_custom_rate(&self, rate: CustomRate) -> ApplicationResult<()> {
        let party = self
            .parties
            .get(rate.support_structure())
            .await?
            .ok_or_else(|| ApplicationError::not_found("Party", rate.support_structure().as_str()))?;
        if party.kind() != PartyKind::SupportStructure {
            return Err(ApplicationError::validation(format!(
                "custom rates apply to support structures, {} is a {}",
                party.id(),
                party.kind()
            )));
        }
        if !party.is_approved() {
            return Err(ApplicationError::NotApproved(party.id().clone()));
        }
        self.resolver.add_custom_rate(rate).map_err(|e| {
            if e.is_integrity() {
                ApplicationError::conflict(e.to_string())
            } else {
                e.into()
            }
        })?;
        info!("Custom rate added");
        Ok(())
    }

    async fn approved_participants(
        &self,
        sale: &SaleEvent,
    ) -> ApplicationResult<HashMap<PartyId, PartyKind>> {
        let mut approved = HashMap::new();
        let participants = std::iter::once(&sale.seller)
            .chain(sale.referrals.party_ids())
            .chain(std::iter::once(self.resolver.platform_party()));
        for id in participants {
            if let Some(party) = self.parties.get(id).await?.filter(|p| p.is_approved()) {
                approved.insert(party.id().clone(), party.kind());
            }
        }
        Ok(approved)
    }

    async fn trailing_volume(
        &self,
        support_structure: Option<&PartyId>,
        until: Timestamp,
    ) -> ApplicationResult<Amount> {
        let Some(support) = support_structure else {
            return Ok(Amount::ZERO);
        };
        let since = until.sub_days(self.config.volume_window_days);
        Ok(self.ledger.referred_volume(support, since, until).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{Fixture, amount};
    use crate::domain::entities::rate_table::RatePair;
    use crate::domain::entities::sale::{Referral, ReferralSplit};
    use crate::domain::value_objects::{Currency, PartyKind, RateSource, TransactionId, TransactionStatus};

    fn service(fx: &Fixture) -> SettlementService {
        SettlementService::new(
            Arc::clone(&fx.resolver),
            fx.ledger(),
            fx.parties(),
            fx.notifier.clone(),
            SettlementConfig::default(),
        )
    }

    fn sale(seller: &PartyId, referrals: ReferralSplit, value: &str, at: Timestamp) -> SaleEvent {
        SaleEvent {
            sale_id: TransactionId::new_v4(),
            seller: seller.clone(),
            referrals,
            category: None,
            amount: amount(value),
            currency: Currency::usd(),
            occurred_at: at,
        }
    }

    #[tokio::test]
    async fn tier_rate_from_trailing_volume() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let support = fx.approved("incubator", PartyKind::SupportStructure).await;
        let svc = service(&fx);

        let earlier = Timestamp::now().sub_days(5);
        svc.record_sale(sale(&seller, ReferralSplit::single(support.clone()), "9000.00", earlier))
            .await
            .unwrap();

        let receipt = svc
            .record_sale(sale(&seller, ReferralSplit::single(support.clone()), "2000.00", Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(receipt.split.resolved().source, RateSource::Tier);
        assert_eq!(receipt.split.supports()[0].amount, amount("160.00"));
        assert_eq!(receipt.split.platform().amount, amount("100.00"));
        assert_eq!(receipt.split.seller().amount, amount("1740.00"));
        assert_eq!(receipt.commissions.len(), 2);
        assert!(receipt.commissions.iter().all(|c| c.status() == TransactionStatus::Pending));
    }

    #[tokio::test]
    async fn second_tier_applies_at_boundary() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let support = fx.approved("incubator", PartyKind::SupportStructure).await;
        let svc = service(&fx);

        svc.record_sale(sale(
            &seller,
            ReferralSplit::single(support.clone()),
            "10000.00",
            Timestamp::now().sub_days(1),
        ))
        .await
        .unwrap();
        let receipt = svc
            .record_sale(sale(&seller, ReferralSplit::single(support), "1000.00", Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(receipt.split.supports()[0].amount, amount("100.00"));
        assert_eq!(receipt.split.platform().amount, amount("40.00"));
    }

    #[tokio::test]
    async fn unclaimed_pool_returns_to_seller() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let support = fx.approved("incubator", PartyKind::SupportStructure).await;
        let svc = service(&fx);

        let split = ReferralSplit::new(vec![Referral {
            party_id: support,
            pool_share: BasisPoints::new(5_000).unwrap(),
        }])
        .unwrap();
        let receipt = svc
            .record_sale(sale(&seller, split, "1000.00", Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(receipt.split.supports()[0].amount, amount("40.00"));
        assert_eq!(receipt.split.platform().amount, amount("50.00"));
        assert_eq!(receipt.split.seller().amount, amount("910.00"));
    }

    #[tokio::test]
    async fn unapproved_referrer_rejects_whole_sale() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let support = fx.pending("incubator", PartyKind::SupportStructure).await;
        let svc = service(&fx);

        let err = svc
            .record_sale(sale(&seller, ReferralSplit::single(support), "500.00", Timestamp::now()))
            .await
            .unwrap_err();

        assert!(err.is_not_approved());
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn backdated_sale_is_held_from_commit() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let svc = service(&fx);

        let before = Timestamp::now();
        let receipt = svc
            .record_sale(sale(&seller, ReferralSplit::none(), "1000.00", before.sub_days(4)))
            .await
            .unwrap();

        assert!(!receipt.sale.available_at().is_before(&before.add_duration(svc.config().hold_period)));
        let balance = fx.ledger.balance(&seller).await.unwrap();
        assert_eq!(balance.available, Amount::ZERO);
        assert_eq!(balance.pending, amount("950.00"));

        let matured = Timestamp::now().add_duration(svc.config().hold_period);
        let balance = fx.ledger.balance_at(&seller, matured).await.unwrap();
        assert_eq!(balance.available, amount("950.00"));
    }

    #[tokio::test]
    async fn future_dated_sale_is_rejected() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let svc = service(&fx);

        let err = svc
            .record_sale(sale(&seller, ReferralSplit::none(), "100.00", Timestamp::now().add_secs(3_600)))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn seller_cannot_be_listed_as_referrer() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let rival = fx.approved("rival", PartyKind::Seller).await;
        let svc = service(&fx);

        let err = svc
            .record_sale(sale(&seller, ReferralSplit::single(rival), "500.00", Timestamp::now()))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn custom_rate_requires_approved_support_structure() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let pending = fx.pending("incubator", PartyKind::SupportStructure).await;
        let svc = service(&fx);
        let rate_for = |party: &PartyId| {
            CustomRate::new(
                party.clone(),
                RatePair::from_bps(1200, 300).unwrap(),
                Timestamp::now().sub_days(1),
                None,
            )
            .unwrap()
        };

        assert!(svc.add_custom_rate(rate_for(&seller)).await.unwrap_err().is_validation());
        assert!(svc.add_custom_rate(rate_for(&pending)).await.unwrap_err().is_not_approved());
        assert!(svc.rate_table().custom_rates_for(&seller).is_empty());
        assert!(svc.rate_table().custom_rates_for(&pending).is_empty());
    }

    #[tokio::test]
    async fn foreign_currency_is_rejected() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let svc = service(&fx);

        let mut event = sale(&seller, ReferralSplit::none(), "100.00", Timestamp::now());
        event.currency = Currency::eur();
        let err = svc.record_sale(event).await.unwrap_err();

        assert!(err.is_validation());
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn duplicate_sale_id_is_a_conflict() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let svc = service(&fx);

        let event = sale(&seller, ReferralSplit::none(), "100.00", Timestamp::now());
        svc.record_sale(event.clone()).await.unwrap();
        let err = svc.record_sale(event).await.unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn settled_sale_emits_event() {
        let fx = Fixture::new().await;
        let seller = fx.approved("startup", PartyKind::Seller).await;
        let svc = service(&fx);

        svc.record_sale(sale(&seller, ReferralSplit::none(), "100.00", Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(fx.events(1).await, vec!["SaleSettled"]);
    }

    #[tokio::test]
    async fn custom_rate_requires_known_party_and_wins_preview() {
        let fx = Fixture::new().await;
        let support = fx.approved("incubator", PartyKind::SupportStructure).await;
        let svc = service(&fx);

        let unknown = CustomRate::new(
            PartyId::new("ghost"),
            RatePair::from_bps(1200, 300).unwrap(),
            Timestamp::now().sub_days(1),
            None,
        )
        .unwrap();
        assert!(svc.add_custom_rate(unknown).await.unwrap_err().is_not_found());

        let custom = CustomRate::new(
            support.clone(),
            RatePair::from_bps(1200, 300).unwrap(),
            Timestamp::now().sub_days(1),
            None,
        )
        .unwrap();
        svc.add_custom_rate(custom).await.unwrap();

        let preview = svc.preview_rate(Some(&support), Some("hardware")).await.unwrap();
        assert_eq!(preview.resolved.source, RateSource::Custom);
        assert_eq!(preview.seller_bps.as_u32(), 8_500);
    }

    #[tokio::test]
    async fn category_rate_preview_without_referrer() {
        let fx = Fixture::new().await;
        let svc = service(&fx);
        svc.set_category_rate(CategoryRate {
            category: "saas".to_string(),
            rate: RatePair::from_bps(600, 600).unwrap(),
        })
        .unwrap();

        let preview = svc.preview_rate(None, Some("saas")).await.unwrap();
        assert_eq!(preview.resolved.source, RateSource::Category);
        assert_eq!(preview.trailing_volume, Amount::ZERO);
        assert!(svc.rate_table().category_rate("saas").is_some());
        assert_eq!(svc.rate_table().tiers().tiers().len(), 2);
    }
}
