//! End-to-end ledger scenarios over the in-memory adapters.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use proptest::prelude::*;
use settlement_ledger::application::services::{
    ApprovalQueue, PayoutWorkflow, SettlementConfig, SettlementService,
};
use settlement_ledger::domain::entities::party::Party;
use settlement_ledger::domain::entities::rate_table::{CommissionTier, RatePair, RateTable};
use settlement_ledger::domain::entities::sale::{ReferralSplit, SaleEvent, SaleGroup};
use settlement_ledger::domain::entities::transaction::Transaction;
use settlement_ledger::domain::services::balance::replay_balance;
use settlement_ledger::domain::services::commission_resolver::{CommissionResolver, ResolverConfig};
use settlement_ledger::domain::value_objects::{
    Amount, ApprovalStatus, Currency, Decision, IdempotencyKey, ModeratorId, PartyId, PartyKind,
    PayoutStatus, Timestamp, TransactionId,
};
use settlement_ledger::infrastructure::notifications::Notifier;
use settlement_ledger::infrastructure::persistence::in_memory::{
    InMemoryLedgerStore, InMemoryPartyRepository, InMemoryPayoutRepository,
};
use settlement_ledger::infrastructure::persistence::{
    LedgerStore, PartyRepository, PayoutRepository,
};
use settlement_ledger::infrastructure::processor::{
    ProcessorError, SimulatedBehavior, SimulatedPaymentProcessor,
};
use std::sync::Arc;
use std::time::Duration;

const PLATFORM: &str = "platform";

fn usd(value: &str) -> Amount {
    value.parse().unwrap()
}

struct Harness {
    parties: Arc<dyn PartyRepository>,
    ledger: Arc<dyn LedgerStore>,
    processor: Arc<SimulatedPaymentProcessor>,
    settlement: SettlementService,
    payouts: PayoutWorkflow,
    approvals: ApprovalQueue,
}

impl Harness {
    /// Sales clear immediately so payouts can draw on them.
    async fn new() -> Self {
        let parties: Arc<dyn PartyRepository> = Arc::new(InMemoryPartyRepository::new());
        parties
            .insert(&Party::platform(PartyId::new(PLATFORM), "Marketplace"))
            .await
            .unwrap();
        let ledger: Arc<dyn LedgerStore> =
            Arc::new(InMemoryLedgerStore::new(Currency::usd(), Arc::clone(&parties)));
        let payout_repo: Arc<dyn PayoutRepository> = Arc::new(InMemoryPayoutRepository::new());
        let processor = Arc::new(SimulatedPaymentProcessor::succeeding());

        let tiers = RateTable::new(
            vec![
                CommissionTier::new(
                    Amount::ZERO,
                    Some(usd("10000.00")),
                    RatePair::from_bps(800, 500).unwrap(),
                ),
                CommissionTier::new(usd("10000.00"), None, RatePair::from_bps(1000, 400).unwrap()),
            ],
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let resolver = Arc::new(CommissionResolver::new(
            tiers,
            ResolverConfig::new(PartyId::new(PLATFORM)),
        ));

        Self {
            settlement: SettlementService::new(
                resolver,
                Arc::clone(&ledger),
                Arc::clone(&parties),
                Notifier::new(),
                SettlementConfig {
                    hold_period: Duration::ZERO,
                    ..SettlementConfig::default()
                },
            ),
            payouts: PayoutWorkflow::new(
                Arc::clone(&ledger),
                payout_repo,
                Arc::clone(&parties),
                Arc::clone(&processor) as _,
                Notifier::new(),
            )
            .with_processor_timeout(Duration::from_secs(1)),
            approvals: ApprovalQueue::new(Arc::clone(&parties), Notifier::new()),
            parties,
            ledger,
            processor,
        }
    }

    async fn approved(&self, id: &str, kind: PartyKind) -> PartyId {
        let party = self
            .approvals
            .submit(PartyId::new(id), kind, id.to_string())
            .await
            .unwrap();
        self.approvals
            .decide(party.id(), Decision::Approve, ModeratorId::new("moderator"))
            .await
            .unwrap();
        party.id().clone()
    }

    /// Credits `party` with a matured sale that pays no commission.
    async fn fund(&self, party: &PartyId, value: Amount) {
        let earlier = Timestamp::now().sub_days(10);
        let sale = Transaction::sale(
            TransactionId::new_v4(),
            party.clone(),
            value,
            Currency::usd(),
            earlier,
            earlier,
        )
        .unwrap();
        self.ledger
            .append_sale(SaleGroup::new(sale, Vec::new(), Vec::new()).unwrap())
            .await
            .unwrap();
    }

    async fn available(&self, party: &PartyId) -> Amount {
        self.ledger.balance(party).await.unwrap().available
    }

    async fn assert_replay_matches(&self, party: &PartyId) {
        let as_of = Timestamp::now();
        let log = self.ledger.log().await.unwrap();
        let replayed = replay_balance(party, &Currency::usd(), &log, as_of).unwrap();
        let live = self.ledger.balance_at(party, as_of).await.unwrap();
        assert_eq!(replayed.available, live.available);
        assert_eq!(replayed.pending, live.pending);
    }
}

fn sale(seller: &PartyId, referrer: &PartyId, value: &str, days_ago: i64) -> SaleEvent {
    SaleEvent {
        sale_id: TransactionId::new_v4(),
        seller: seller.clone(),
        referrals: ReferralSplit::single(referrer.clone()),
        category: None,
        amount: usd(value),
        currency: Currency::usd(),
        occurred_at: Timestamp::now().sub_days(days_ago),
    }
}

#[tokio::test]
async fn tiered_commission_on_referred_sale() {
    let h = Harness::new().await;
    let seller = h.approved("startup", PartyKind::Seller).await;
    let other = h.approved("other-startup", PartyKind::Seller).await;
    let incubator = h.approved("incubator", PartyKind::SupportStructure).await;

    h.settlement
        .record_sale(sale(&other, &incubator, "9000.00", 6))
        .await
        .unwrap();
    let before = h.available(&incubator).await;

    let receipt = h
        .settlement
        .record_sale(sale(&seller, &incubator, "2000.00", 5))
        .await
        .unwrap();

    assert_eq!(receipt.split.supports()[0].amount, usd("160.00"));
    assert_eq!(receipt.split.platform().amount, usd("100.00"));
    assert_eq!(receipt.split.seller().amount, usd("1740.00"));
    assert_eq!(
        h.available(&incubator).await.checked_sub(before).unwrap(),
        usd("160.00")
    );
    assert_eq!(h.available(&seller).await, usd("1740.00"));

    for party in [&seller, &other, &incubator, &PartyId::new(PLATFORM)] {
        h.assert_replay_matches(party).await;
    }
}

#[tokio::test]
async fn repeated_payout_key_debits_once() {
    let h = Harness::new().await;
    let party = h.approved("startup", PartyKind::Seller).await;
    h.fund(&party, usd("500.00")).await;

    let first = h
        .payouts
        .request_payout(party.clone(), usd("500.00"), IdempotencyKey::new("payout-1"))
        .await
        .unwrap();
    let second = h
        .payouts
        .request_payout(party.clone(), usd("500.00"), IdempotencyKey::new("payout-1"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.status(), PayoutStatus::Completed);
    assert_eq!(h.available(&party).await, Amount::ZERO);
    assert_eq!(h.processor.call_count(), 1);
    assert_eq!(h.payouts.list_payouts(&party).await.unwrap().len(), 1);
}

#[tokio::test]
async fn overdraft_is_rejected_without_side_effects() {
    let h = Harness::new().await;
    let party = h.approved("startup", PartyKind::Seller).await;
    h.fund(&party, usd("500.00")).await;
    let log_before = h.ledger.log().await.unwrap().len();

    let err = h
        .payouts
        .request_payout(party.clone(), usd("600.00"), IdempotencyKey::new("too-much"))
        .await
        .unwrap_err();

    assert!(err.is_insufficient_balance());
    assert_eq!(h.ledger.log().await.unwrap().len(), log_before);
    assert_eq!(h.available(&party).await, usd("500.00"));
    assert!(h.payouts.list_payouts(&party).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_moderation_has_one_winner() {
    let h = Arc::new(Harness::new().await);
    let party = h
        .approvals
        .submit(PartyId::new("startup"), PartyKind::Seller, "Startup".to_string())
        .await
        .unwrap();

    let approve = {
        let h = Arc::clone(&h);
        let id = party.id().clone();
        tokio::spawn(async move {
            h.approvals
                .decide(&id, Decision::Approve, ModeratorId::new("admin-a"))
                .await
        })
    };
    let reject = {
        let h = Arc::clone(&h);
        let id = party.id().clone();
        tokio::spawn(async move {
            h.approvals
                .decide(&id, Decision::Reject, ModeratorId::new("admin-b"))
                .await
        })
    };
    let results = [approve.await.unwrap(), reject.await.unwrap()];

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(loser.is_conflict());

    let stored = h.parties.get(party.id()).await.unwrap().unwrap();
    assert_eq!(stored.approval_status(), winners[0].approval_status());
    assert_ne!(stored.approval_status(), ApprovalStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payouts_never_overdraw() {
    let h = Arc::new(Harness::new().await);
    let party = h.approved("startup", PartyKind::Seller).await;
    h.fund(&party, usd("1000.00")).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let h = Arc::clone(&h);
        let party = party.clone();
        handles.push(tokio::spawn(async move {
            h.payouts
                .request_payout(party, usd("150.00"), IdempotencyKey::new(format!("k{i}")))
                .await
        }));
    }
    let mut completed = 0;
    for handle in handles {
        if let Ok(request) = handle.await.unwrap() {
            if request.status() == PayoutStatus::Completed {
                completed += 1;
            }
        }
    }

    assert_eq!(completed, 6);
    assert_eq!(h.available(&party).await, usd("100.00"));
    h.assert_replay_matches(&party).await;
}

#[derive(Debug, Clone)]
enum Op {
    Sale { cents: i64, days_ago: i64 },
    Payout { cents: i64, outcome: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..500_000, 0i64..6).prop_map(|(cents, days_ago)| Op::Sale { cents, days_ago }),
        (1i64..300_000, 0u8..3).prop_map(|(cents, outcome)| Op::Payout { cents, outcome }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn balances_stay_non_negative_and_replayable(ops in proptest::collection::vec(op(), 1..25)) {
        tokio_test::block_on(async {
            let h = Harness::new().await;
            let seller = h.approved("seller", PartyKind::Seller).await;
            let incubator = h.approved("incubator", PartyKind::SupportStructure).await;

            for (i, op) in ops.iter().enumerate() {
                match op {
                    Op::Sale { cents, days_ago } => {
                        let value = Amount::from_minor(*cents).to_string();
                        h.settlement
                            .record_sale(sale(&seller, &incubator, &value, *days_ago))
                            .await
                            .unwrap();
                    }
                    Op::Payout { cents, outcome } => {
                        h.processor.set_behavior(match outcome {
                            0 => SimulatedBehavior::Succeed,
                            1 => SimulatedBehavior::Decline("limit".to_string()),
                            _ => SimulatedBehavior::Fail(ProcessorError::connection("down")),
                        });
                        let result = h
                            .payouts
                            .request_payout(
                                seller.clone(),
                                Amount::from_minor(*cents),
                                IdempotencyKey::new(format!("op-{i}")),
                            )
                            .await;
                        if let Err(e) = result {
                            assert!(e.is_insufficient_balance(), "unexpected error {e}");
                        }
                    }
                }

                for party in [&seller, &incubator] {
                    let balance = h.ledger.balance(party).await.unwrap();
                    assert!(balance.available >= Amount::ZERO);
                    assert!(balance.pending >= Amount::ZERO);
                }
            }

            for party in [&seller, &incubator, &PartyId::new(PLATFORM)] {
                h.assert_replay_matches(party).await;
            }
        });
    }
}
