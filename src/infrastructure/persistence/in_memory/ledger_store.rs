//! # In-Memory Ledger Store
//!
//! In-memory implementation of [`LedgerStore`].
//!
//! Each party owns an account guarded by its own `tokio::sync::Mutex`.
//! Writes hold the locks of every party they touch, acquired in ascending
//! party id order, for the whole check-then-append sequence. A shared index
//! tracks transaction id ownership, commission totals per sale and referred
//! sales per support structure; it is only written while the owning
//! accounts are locked.

use crate::domain::entities::sale::SaleGroup;
use crate::domain::entities::transaction::Transaction;
use crate::domain::services::balance::{Balance, fold_balance};
use crate::domain::value_objects::{
    Amount, Currency, PartyId, Timestamp, TransactionId, TransactionStatus, TransactionType,
};
use crate::infrastructure::persistence::traits::{
    LedgerError, LedgerResult, LedgerStore, Page, PartyRepository, TransactionFilter,
};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Account {
    entries: Vec<Entry>,
    positions: HashMap<TransactionId, usize>,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    tx: Transaction,
}

impl Account {
    fn push(&mut self, seq: u64, tx: Transaction) {
        self.positions.insert(tx.id(), self.entries.len());
        self.entries.push(Entry { seq, tx });
    }

    fn get_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        let pos = *self.positions.get(&id)?;
        self.entries.get_mut(pos).map(|e| &mut e.tx)
    }

    fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter().map(|e| &e.tx)
    }
}

#[derive(Debug, Clone, Copy)]
struct ReferredSale {
    at: Timestamp,
    amount: Amount,
}

#[derive(Debug, Default)]
struct LedgerIndex {
    owners: HashMap<TransactionId, PartyId>,
    distributed: HashMap<TransactionId, Amount>,
    referred: HashMap<PartyId, Vec<ReferredSale>>,
}

impl LedgerIndex {
    fn distributed(&self, sale_id: TransactionId) -> Amount {
        self.distributed.get(&sale_id).copied().unwrap_or(Amount::ZERO)
    }
}

/// In-memory implementation of [`LedgerStore`].
pub struct InMemoryLedgerStore {
    currency: Currency,
    parties: Arc<dyn PartyRepository>,
    accounts: DashMap<PartyId, Arc<Mutex<Account>>>,
    index: RwLock<LedgerIndex>,
    sequence: AtomicU64,
}

impl fmt::Debug for InMemoryLedgerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLedgerStore")
            .field("currency", &self.currency)
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryLedgerStore {
    /// Creates an empty store settling in `currency` that checks approvals
    /// against `parties`.
    #[must_use]
    pub fn new(currency: Currency, parties: Arc<dyn PartyRepository>) -> Self {
        Self {
            currency,
            parties,
            accounts: DashMap::new(),
            index: RwLock::new(LedgerIndex::default()),
            sequence: AtomicU64::new(0),
        }
    }

    /// Returns the number of recorded transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().owners.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn account(&self, party_id: &PartyId) -> Arc<Mutex<Account>> {
        self.accounts
            .entry(party_id.clone())
            .or_default()
            .value()
            .clone()
    }

    fn existing_account(&self, party_id: &PartyId) -> Option<Arc<Mutex<Account>>> {
        self.accounts.get(party_id).map(|a| a.value().clone())
    }

    /// Locks the given parties in ascending id order.
    async fn lock_all(&self, sorted_ids: &[PartyId]) -> Vec<OwnedMutexGuard<Account>> {
        let mut guards = Vec::with_capacity(sorted_ids.len());
        for id in sorted_ids {
            guards.push(self.account(id).lock_owned().await);
        }
        guards
    }

    fn check_currency(&self, currency: &Currency) -> LedgerResult<()> {
        if currency != &self.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: self.currency.clone(),
                actual: currency.clone(),
            });
        }
        Ok(())
    }

    async fn check_approved(&self, party_id: &PartyId) -> LedgerResult<()> {
        if !self.parties.is_approved(party_id).await? {
            return Err(LedgerError::PartyNotApproved(party_id.clone()));
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn fold(&self, party_id: &PartyId, account: &Account, as_of: Timestamp) -> LedgerResult<Balance> {
        let index = self.index.read();
        let balance = fold_balance(
            party_id,
            &self.currency,
            account.transactions(),
            |sale_id| index.distributed(sale_id),
            as_of,
        )?;
        Ok(balance)
    }

    async fn transition_debit(
        &self,
        party_id: &PartyId,
        transaction_id: TransactionId,
        provider_reference: Option<String>,
        complete: bool,
    ) -> LedgerResult<Transaction> {
        let account = self
            .existing_account(party_id)
            .ok_or(LedgerError::UnknownTransaction(transaction_id))?;
        let mut account = account.lock().await;
        let tx = account
            .get_mut(transaction_id)
            .filter(|tx| tx.kind() == TransactionType::Payout)
            .ok_or(LedgerError::UnknownTransaction(transaction_id))?;
        let now = Timestamp::now();
        if complete {
            tx.complete(provider_reference, now)?;
        } else {
            tx.fail(provider_reference, now)?;
        }
        debug!(
            party_id = %party_id,
            transaction_id = %transaction_id,
            status = %tx.status(),
            "Payout debit settled"
        );
        Ok(tx.clone())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn currency(&self) -> &Currency {
        &self.currency
    }

    async fn append_sale(&self, group: SaleGroup) -> LedgerResult<()> {
        self.check_currency(group.sale().currency())?;

        let party_ids = group.party_ids();
        let mut guards = self.lock_all(&party_ids).await;

        for party_id in party_ids.iter().chain(group.referrers()) {
            self.check_approved(party_id).await?;
        }
        {
            let index = self.index.read();
            if let Some(dup) = group.transactions().find(|tx| index.owners.contains_key(&tx.id())) {
                return Err(LedgerError::DuplicateTransaction(dup.id()));
            }
        }

        let sale_id = group.sale().id();
        let sale_amount = group.sale().amount();
        let sale_at = group.sale().created_at();
        let distributed = group.distributed();
        let (sale, commissions, referrers) = group.into_parts();
        let count = commissions.len() + 1;

        let mut index = self.index.write();
        index.distributed.insert(sale_id, distributed);
        for referrer in &referrers {
            index
                .referred
                .entry(referrer.clone())
                .or_default()
                .push(ReferredSale {
                    at: sale_at,
                    amount: sale_amount,
                });
        }
        for tx in std::iter::once(sale).chain(commissions) {
            let pos = party_ids
                .binary_search(tx.party_id())
                .map_err(|_| LedgerError::UnknownTransaction(tx.id()))?;
            let guard = guards
                .get_mut(pos)
                .ok_or(LedgerError::UnknownTransaction(tx.id()))?;
            index.owners.insert(tx.id(), tx.party_id().clone());
            guard.push(self.next_seq(), tx);
        }
        drop(index);

        info!(
            sale_id = %sale_id,
            amount = %sale_amount,
            transactions = count,
            "Sale group committed"
        );
        Ok(())
    }

    async fn append_debit(&self, debit: Transaction) -> LedgerResult<Balance> {
        self.check_currency(debit.currency())?;
        if debit.kind() != TransactionType::Payout {
            return Err(crate::domain::errors::DomainError::validation(
                "only payout transactions can debit a balance",
            )
            .into());
        }
        let party_id = debit.party_id().clone();
        let mut account = self.account(&party_id).lock_owned().await;

        self.check_approved(&party_id).await?;
        if self.index.read().owners.contains_key(&debit.id()) {
            return Err(LedgerError::DuplicateTransaction(debit.id()));
        }
        if let Some(payout_id) = debit.payout_reference() {
            let live = account.transactions().any(|tx| {
                tx.payout_reference() == Some(payout_id) && tx.status() != TransactionStatus::Failed
            });
            if live {
                return Err(LedgerError::PayoutAlreadyDebited(payout_id));
            }
        }

        let as_of = debit.created_at();
        let before = self.fold(&party_id, &account, as_of)?;
        if debit.amount() > before.available {
            return Err(LedgerError::InsufficientBalance {
                party_id,
                available: before.available,
                requested: debit.amount(),
            });
        }

        self.index
            .write()
            .owners
            .insert(debit.id(), party_id.clone());
        account.push(self.next_seq(), debit);
        self.fold(&party_id, &account, as_of)
    }

    async fn complete_debit(
        &self,
        party_id: &PartyId,
        transaction_id: TransactionId,
        provider_reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        self.transition_debit(party_id, transaction_id, provider_reference, true)
            .await
    }

    async fn fail_debit(
        &self,
        party_id: &PartyId,
        transaction_id: TransactionId,
        provider_reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        self.transition_debit(party_id, transaction_id, provider_reference, false)
            .await
    }

    async fn balance_at(&self, party_id: &PartyId, as_of: Timestamp) -> LedgerResult<Balance> {
        let Some(account) = self.existing_account(party_id) else {
            return Ok(Balance::empty(party_id.clone(), self.currency.clone(), as_of));
        };
        let account = account.lock().await;
        self.fold(party_id, &account, as_of)
    }

    async fn get(&self, transaction_id: TransactionId) -> LedgerResult<Option<Transaction>> {
        let owner = self.index.read().owners.get(&transaction_id).cloned();
        let Some(account) = owner.and_then(|p| self.existing_account(&p)) else {
            return Ok(None);
        };
        let account = account.lock().await;
        Ok(account
            .positions
            .get(&transaction_id)
            .and_then(|pos| account.entries.get(*pos))
            .map(|e| e.tx.clone()))
    }

    async fn query(
        &self,
        filter: &TransactionFilter,
        offset: u64,
        limit: u64,
    ) -> LedgerResult<Page<Transaction>> {
        let accounts: Vec<Arc<Mutex<Account>>> = match &filter.party_id {
            Some(party_id) => self.existing_account(party_id).into_iter().collect(),
            None => self.accounts.iter().map(|a| a.value().clone()).collect(),
        };

        let now = Timestamp::now();
        let mut matched: Vec<Entry> = Vec::new();
        for account in accounts {
            let account = account.lock().await;
            matched.extend(
                account
                    .entries
                    .iter()
                    .filter(|e| filter.matches(&e.tx, now))
                    .cloned(),
            );
        }
        matched.sort_by(|a, b| {
            b.tx.created_at()
                .cmp(&a.tx.created_at())
                .then(b.seq.cmp(&a.seq))
        });

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|e| e.tx)
            .collect();
        Ok(Page {
            items,
            total,
            offset,
            limit,
        })
    }

    async fn log(&self) -> LedgerResult<Vec<Transaction>> {
        let accounts: Vec<Arc<Mutex<Account>>> =
            self.accounts.iter().map(|a| a.value().clone()).collect();
        let mut entries: Vec<Entry> = Vec::new();
        for account in accounts {
            entries.extend(account.lock().await.entries.iter().cloned());
        }
        entries.sort_by_key(|e| e.seq);
        Ok(entries.into_iter().map(|e| e.tx).collect())
    }

    async fn referred_volume(
        &self,
        support_structure: &PartyId,
        since: Timestamp,
        until: Timestamp,
    ) -> LedgerResult<Amount> {
        let index = self.index.read();
        let Some(sales) = index.referred.get(support_structure) else {
            return Ok(Amount::ZERO);
        };
        let volume = sales
            .iter()
            .filter(|s| s.at.is_within(&since, &until))
            .try_fold(Amount::ZERO, |acc, s| acc.checked_add(s.amount))
            .map_err(crate::domain::errors::DomainError::from)?;
        Ok(volume)
    }

    async fn release_matured(&self, as_of: Timestamp) -> LedgerResult<usize> {
        let accounts: Vec<Arc<Mutex<Account>>> =
            self.accounts.iter().map(|a| a.value().clone()).collect();
        let mut released = 0;
        for account in accounts {
            let mut account = account.lock().await;
            for entry in &mut account.entries {
                if entry.tx.release_if_due(as_of) {
                    released += 1;
                }
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::party::Party;
    use crate::domain::services::balance::replay_balance;
    use crate::domain::value_objects::{Decision, ModeratorId, PartyKind, PayoutId};
    use crate::infrastructure::persistence::in_memory::InMemoryPartyRepository;
    use std::time::Duration;

    const HOLD: Duration = Duration::from_secs(3 * 24 * 3600);

    fn t0() -> Timestamp {
        Timestamp::from_secs(1_700_000_000).unwrap()
    }

    fn held_until() -> Timestamp {
        t0().add_duration(HOLD)
    }

    fn usd(value: &str) -> Amount {
        value.parse().unwrap()
    }

    async fn approved_repo(ids: &[&str]) -> Arc<InMemoryPartyRepository> {
        let repo = Arc::new(InMemoryPartyRepository::new());
        for id in ids {
            let party = Party::new(PartyId::new(*id), PartyKind::Seller, *id).unwrap();
            repo.insert(&party).await.unwrap();
            repo.decide(&PartyId::new(*id), Decision::Approve, ModeratorId::new("m"), t0())
                .await
                .unwrap();
        }
        repo
    }

    async fn store() -> InMemoryLedgerStore {
        let repo = approved_repo(&["seller", "support", "platform"]).await;
        InMemoryLedgerStore::new(Currency::usd(), repo)
    }

    fn group(sale_amount: &str, support: &str, platform: &str) -> SaleGroup {
        let sale = Transaction::sale(
            TransactionId::new_v4(),
            PartyId::new("seller"),
            usd(sale_amount),
            Currency::usd(),
            t0(),
            held_until(),
        )
        .unwrap();
        let commissions = vec![
            Transaction::commission(PartyId::new("support"), sale.id(), usd(support), Currency::usd(), t0(), held_until())
                .unwrap(),
            Transaction::commission(PartyId::new("platform"), sale.id(), usd(platform), Currency::usd(), t0(), held_until())
                .unwrap(),
        ];
        SaleGroup::new(sale, commissions, vec![PartyId::new("support")]).unwrap()
    }

    fn debit(amount: &str, at: Timestamp) -> Transaction {
        Transaction::payout(PartyId::new("seller"), PayoutId::new_v4(), usd(amount), Currency::usd(), at).unwrap()
    }

    mod append_sale {
        use super::*;

        #[tokio::test]
        async fn credits_are_pending_until_hold_elapses() {
            let store = store().await;
            store.append_sale(group("2000", "160", "100")).await.unwrap();

            let now = store.balance_at(&PartyId::new("seller"), t0()).await.unwrap();
            assert_eq!(now.pending, usd("1740"));
            assert_eq!(now.available, Amount::ZERO);

            let later = store
                .balance_at(&PartyId::new("seller"), t0().add_duration(HOLD))
                .await
                .unwrap();
            assert_eq!(later.available, usd("1740"));
            assert_eq!(store.len(), 3);
        }

        #[tokio::test]
        async fn unapproved_party_rejects_whole_group() {
            let repo = approved_repo(&["seller", "platform"]).await;
            let store = InMemoryLedgerStore::new(Currency::usd(), repo);

            let err = store.append_sale(group("2000", "160", "100")).await.unwrap_err();

            assert!(matches!(err, LedgerError::PartyNotApproved(ref p) if p.as_str() == "support"));
            assert!(store.is_empty());
        }

        #[tokio::test]
        async fn duplicate_sale_id_rejected() {
            let store = store().await;
            let first = group("100", "8", "5");
            let sale_id = first.sale().id();
            store.append_sale(first).await.unwrap();

            let again = Transaction::sale(sale_id, PartyId::new("seller"), usd("50"), Currency::usd(), t0(), held_until())
                .unwrap();
            let dup = SaleGroup::new(again, vec![], vec![]).unwrap();
            let err = store.append_sale(dup).await.unwrap_err();

            assert!(matches!(err, LedgerError::DuplicateTransaction(id) if id == sale_id));
            assert_eq!(store.len(), 3);
        }

        #[tokio::test]
        async fn foreign_currency_rejected() {
            let store = store().await;
            let sale = Transaction::sale(TransactionId::new_v4(), PartyId::new("seller"), usd("1"), Currency::eur(), t0(), held_until())
                .unwrap();
            let err = store
                .append_sale(SaleGroup::new(sale, vec![], vec![]).unwrap())
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::CurrencyMismatch { .. }));
        }

        #[tokio::test]
        async fn tracks_referred_volume() {
            let store = store().await;
            store.append_sale(group("2000", "160", "100")).await.unwrap();
            store.append_sale(group("500", "40", "25")).await.unwrap();

            let support = PartyId::new("support");
            let volume = store.referred_volume(&support, t0().sub_days(30), t0()).await.unwrap();
            assert_eq!(volume, usd("2500"));

            let none = store
                .referred_volume(&support, t0().add_secs(1), t0().add_secs(10))
                .await
                .unwrap();
            assert_eq!(none, Amount::ZERO);
        }
    }

    mod debits {
        use super::*;

        async fn funded_store() -> InMemoryLedgerStore {
            let store = store().await;
            store.append_sale(group("2000", "1400", "100")).await.unwrap();
            store
        }

        #[tokio::test]
        async fn rejects_overdraft_without_recording() {
            let store = funded_store().await;
            let at = t0().add_duration(HOLD);
            let err = store.append_debit(debit("500.01", at)).await.unwrap_err();

            assert!(err.is_insufficient_balance());
            assert_eq!(store.len(), 3);
        }

        #[tokio::test]
        async fn held_funds_cannot_be_paid_out() {
            let store = funded_store().await;
            let err = store.append_debit(debit("1", t0())).await.unwrap_err();
            assert!(err.is_insufficient_balance());
        }

        #[tokio::test]
        async fn debit_reserves_and_failure_releases() {
            let store = funded_store().await;
            let at = t0().add_duration(HOLD);
            let tx = debit("500", at);
            let id = tx.id();

            let after = store.append_debit(tx).await.unwrap();
            assert_eq!(after.available, Amount::ZERO);

            let failed = store
                .fail_debit(&PartyId::new("seller"), id, Some("prov-1".to_string()))
                .await
                .unwrap();
            assert_eq!(failed.provider_reference(), Some("prov-1"));
            let balance = store.balance_at(&PartyId::new("seller"), at).await.unwrap();
            assert_eq!(balance.available, usd("500"));
        }

        #[tokio::test]
        async fn settled_debit_cannot_change_again() {
            let store = funded_store().await;
            let tx = debit("100", t0().add_duration(HOLD));
            let id = tx.id();
            store.append_debit(tx).await.unwrap();
            store.complete_debit(&PartyId::new("seller"), id, None).await.unwrap();

            let err = store.fail_debit(&PartyId::new("seller"), id, None).await.unwrap_err();
            assert!(matches!(err, LedgerError::Domain(_)));
        }

        #[tokio::test]
        async fn one_live_debit_per_payout() {
            let store = funded_store().await;
            let at = t0().add_duration(HOLD);
            let payout_id = PayoutId::new_v4();
            let seller = PartyId::new("seller");
            let debit_for = |amount: &str| {
                Transaction::payout(seller.clone(), payout_id, usd(amount), Currency::usd(), at).unwrap()
            };

            let first = debit_for("100");
            let first_id = first.id();
            store.append_debit(first).await.unwrap();
            let err = store.append_debit(debit_for("100")).await.unwrap_err();
            assert!(matches!(err, LedgerError::PayoutAlreadyDebited(id) if id == payout_id));

            store.fail_debit(&seller, first_id, None).await.unwrap();
            let retry = debit_for("100");
            let retry_id = retry.id();
            store.append_debit(retry).await.unwrap();
            store.complete_debit(&seller, retry_id, None).await.unwrap();

            let err = store.append_debit(debit_for("100")).await.unwrap_err();
            assert!(matches!(err, LedgerError::PayoutAlreadyDebited(_)));
            let balance = store.balance_at(&seller, at).await.unwrap();
            assert_eq!(balance.available, usd("400"));
        }

        #[tokio::test]
        async fn concurrent_debits_never_overdraw() {
            let store = Arc::new(funded_store().await);
            let at = t0().add_duration(HOLD);

            let handles: Vec<_> = (0..10)
                .map(|_| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move { store.append_debit(debit("100", at)).await })
                })
                .collect();
            let mut accepted = 0;
            for handle in handles {
                if handle.await.unwrap().is_ok() {
                    accepted += 1;
                }
            }

            assert_eq!(accepted, 5);
            let balance = store.balance_at(&PartyId::new("seller"), at).await.unwrap();
            assert_eq!(balance.available, Amount::ZERO);
        }
    }

    mod reads {
        use super::*;

        #[tokio::test]
        async fn sweep_releases_matured_credits() {
            let store = store().await;
            store.append_sale(group("2000", "160", "100")).await.unwrap();

            assert_eq!(store.release_matured(t0()).await.unwrap(), 0);
            assert_eq!(store.release_matured(t0().add_duration(HOLD)).await.unwrap(), 3);
            assert_eq!(store.release_matured(t0().add_duration(HOLD)).await.unwrap(), 0);
        }

        #[tokio::test]
        async fn replay_matches_live_balance() {
            let store = store().await;
            store.append_sale(group("2000", "160", "100")).await.unwrap();
            store.append_sale(group("999.99", "80", "49.99")).await.unwrap();
            let at = t0().add_duration(HOLD);
            store.append_debit(debit("300", at)).await.unwrap();

            let log = store.log().await.unwrap();
            for party in ["seller", "support", "platform"] {
                let party = PartyId::new(party);
                let live = store.balance_at(&party, at).await.unwrap();
                let replayed = replay_balance(&party, &Currency::usd(), &log, at).unwrap();
                assert_eq!(live, replayed);
            }
        }

        #[tokio::test]
        async fn query_filters_and_paginates() {
            let store = store().await;
            store.append_sale(group("100", "8", "5")).await.unwrap();
            store.append_sale(group("200", "16", "10")).await.unwrap();

            let sales = TransactionFilter {
                kind: Some(TransactionType::Sale),
                ..TransactionFilter::default()
            };
            let page = store.query(&sales, 0, 1).await.unwrap();
            assert_eq!(page.total, 2);
            assert_eq!(page.items.len(), 1);
            // newest first
            assert_eq!(page.items[0].amount(), usd("200"));

            let support = TransactionFilter {
                party_id: Some(PartyId::new("support")),
                ..TransactionFilter::default()
            };
            assert_eq!(store.query(&support, 0, 10).await.unwrap().total, 2);
        }

        #[tokio::test]
        async fn get_finds_by_id() {
            let store = store().await;
            let g = group("100", "8", "5");
            let id = g.commissions()[0].id();
            store.append_sale(g).await.unwrap();

            let tx = store.get(id).await.unwrap().unwrap();
            assert_eq!(tx.party_id().as_str(), "support");
            assert!(store.get(TransactionId::new_v4()).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn unknown_party_has_empty_balance() {
            let store = store().await;
            let balance = store.balance_at(&PartyId::new("nobody"), t0()).await.unwrap();
            assert_eq!(balance.available, Amount::ZERO);
            assert_eq!(balance.pending, Amount::ZERO);
        }
    }
}
