//! In-memory wiring shared by the service tests.

#![allow(clippy::unwrap_used)]

use crate::domain::entities::party::Party;
use crate::domain::entities::rate_table::{CommissionTier, RatePair, RateTable};
use crate::domain::services::commission_resolver::{CommissionResolver, ResolverConfig};
use crate::domain::value_objects::{Amount, Currency, Decision, ModeratorId, PartyId, PartyKind, Timestamp};
use crate::infrastructure::notifications::{Notifier, RecordingDispatcher};
use crate::infrastructure::persistence::in_memory::{
    InMemoryLedgerStore, InMemoryPartyRepository, InMemoryPayoutRepository,
};
use crate::infrastructure::persistence::{LedgerStore, PartyRepository, PayoutRepository};
use std::sync::Arc;

pub(crate) const PLATFORM: &str = "platform";

pub(crate) fn amount(value: &str) -> Amount {
    value.parse().unwrap()
}

pub(crate) fn tiers() -> RateTable {
    RateTable::new(
        vec![
            CommissionTier::new(
                Amount::ZERO,
                Some(amount("10000.00")),
                RatePair::from_bps(800, 500).unwrap(),
            ),
            CommissionTier::new(amount("10000.00"), None, RatePair::from_bps(1000, 400).unwrap()),
        ],
        Vec::new(),
        Vec::new(),
    )
    .unwrap()
}

pub(crate) struct Fixture {
    pub parties: Arc<InMemoryPartyRepository>,
    pub ledger: Arc<InMemoryLedgerStore>,
    pub payouts: Arc<InMemoryPayoutRepository>,
    pub resolver: Arc<CommissionResolver>,
    pub recorder: RecordingDispatcher,
    pub notifier: Notifier,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let parties = Arc::new(InMemoryPartyRepository::new());
        parties
            .insert(&Party::platform(PartyId::new(PLATFORM), "Marketplace"))
            .await
            .unwrap();
        let ledger = Arc::new(InMemoryLedgerStore::new(
            Currency::usd(),
            Arc::clone(&parties) as Arc<dyn PartyRepository>,
        ));
        let resolver = Arc::new(CommissionResolver::new(
            tiers(),
            ResolverConfig::new(PartyId::new(PLATFORM)),
        ));
        let recorder = RecordingDispatcher::new();
        let notifier = Notifier::new().with_dispatcher(Arc::new(recorder.clone()));
        Self {
            parties,
            ledger,
            payouts: Arc::new(InMemoryPayoutRepository::new()),
            resolver,
            recorder,
            notifier,
        }
    }

    pub(crate) fn ledger(&self) -> Arc<dyn LedgerStore> {
        Arc::clone(&self.ledger) as Arc<dyn LedgerStore>
    }

    pub(crate) fn parties(&self) -> Arc<dyn PartyRepository> {
        Arc::clone(&self.parties) as Arc<dyn PartyRepository>
    }

    pub(crate) fn payouts(&self) -> Arc<dyn PayoutRepository> {
        Arc::clone(&self.payouts) as Arc<dyn PayoutRepository>
    }

    /// Inserts a pending party.
    pub(crate) async fn pending(&self, id: &str, kind: PartyKind) -> PartyId {
        let party = Party::new(PartyId::new(id), kind, id).unwrap();
        self.parties.insert(&party).await.unwrap();
        party.id().clone()
    }

    /// Inserts and approves a party.
    pub(crate) async fn approved(&self, id: &str, kind: PartyKind) -> PartyId {
        let party_id = self.pending(id, kind).await;
        self.parties
            .decide(&party_id, Decision::Approve, ModeratorId::new("mod"), Timestamp::now())
            .await
            .unwrap();
        party_id
    }

    /// Waits for background notifications to land.
    pub(crate) async fn events(&self, expected: usize) -> Vec<&'static str> {
        for _ in 0..100 {
            if self.recorder.events().len() >= expected {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        self.recorder.event_names()
    }
}
