//! # Balance Derivation
//!
//! Balances are never stored. They are folded from a party's transactions:
//!
//! - `pending`: credits still inside their hold window
//! - `available`: matured credits minus every payout debit that has not
//!   failed (in-flight debits reserve funds until they settle)
//!
//! A sale credits its seller with the gross amount minus the commissions
//! distributed from it. Failed transactions contribute nothing.
//!
//! The same fold backs live balance reads and full log replay, so both
//! always agree.

use crate::domain::entities::transaction::Transaction;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    Amount, Currency, PartyId, Timestamp, TransactionId, TransactionStatus, TransactionType,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// A party's derived balance at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// The party.
    pub party_id: PartyId,
    /// Settlement currency.
    pub currency: Currency,
    /// Funds that can be paid out.
    pub available: Amount,
    /// Credits still on hold.
    pub pending: Amount,
    /// The instant the balance was derived for.
    pub as_of: Timestamp,
}

impl Balance {
    /// An empty balance.
    #[must_use]
    pub fn empty(party_id: PartyId, currency: Currency, as_of: Timestamp) -> Self {
        Self {
            party_id,
            currency,
            available: Amount::ZERO,
            pending: Amount::ZERO,
            as_of,
        }
    }
}

/// Running totals of a balance fold.
#[derive(Debug, Clone, Default)]
pub struct BalanceAccumulator {
    matured: Decimal,
    pending: Decimal,
    debited: Decimal,
}

impl BalanceAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one transaction owned by the party.
    ///
    /// `distributed` is the commission total taken from a sale; it is
    /// ignored for other transaction types.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if commissions exceed the sale.
    pub fn apply(&mut self, tx: &Transaction, distributed: Amount, as_of: Timestamp) -> DomainResult<()> {
        let status = tx.effective_status(as_of);
        if status == TransactionStatus::Failed {
            return Ok(());
        }
        match tx.kind() {
            TransactionType::Payout => {
                self.debited += tx.amount().value();
            }
            TransactionType::Sale | TransactionType::Commission => {
                let credit = if tx.kind() == TransactionType::Sale {
                    tx.amount().checked_sub(distributed).map_err(|_| {
                        DomainError::CommissionExceedsSale {
                            commissions: distributed.to_string(),
                            sale: tx.amount().to_string(),
                        }
                    })?
                } else {
                    tx.amount()
                };
                if status == TransactionStatus::Completed {
                    self.matured += credit.value();
                } else {
                    self.pending += credit.value();
                }
            }
        }
        Ok(())
    }

    /// Produces the balance.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Integrity` if debits exceed matured credits,
    /// which means the ledger was written without a balance check.
    pub fn finish(self, party_id: PartyId, currency: Currency, as_of: Timestamp) -> DomainResult<Balance> {
        let available = self.matured - self.debited;
        if available.is_sign_negative() && !available.is_zero() {
            return Err(DomainError::integrity(format!(
                "party {party_id} has negative available balance {available}"
            )));
        }
        Ok(Balance {
            party_id,
            currency,
            available: Amount::new(available)?,
            pending: Amount::new(self.pending)?,
            as_of,
        })
    }
}

/// Folds a party's own transactions into a balance.
///
/// `distributed` looks up the commission total of each of the party's sales.
///
/// # Errors
///
/// Returns `DomainError::Integrity` if the transactions are inconsistent.
pub fn fold_balance<'a, F>(
    party_id: &PartyId,
    currency: &Currency,
    transactions: impl IntoIterator<Item = &'a Transaction>,
    distributed: F,
    as_of: Timestamp,
) -> DomainResult<Balance>
where
    F: Fn(TransactionId) -> Amount,
{
    let mut acc = BalanceAccumulator::new();
    for tx in transactions {
        if tx.party_id() != party_id || tx.currency() != currency {
            continue;
        }
        let taken = if tx.kind() == TransactionType::Sale {
            distributed(tx.id())
        } else {
            Amount::ZERO
        };
        acc.apply(tx, taken, as_of)?;
    }
    acc.finish(party_id.clone(), currency.clone(), as_of)
}

/// Recomputes a balance from the complete transaction log.
///
/// # Errors
///
/// Returns `DomainError::Integrity` if the log is inconsistent.
pub fn replay_balance(
    party_id: &PartyId,
    currency: &Currency,
    log: &[Transaction],
    as_of: Timestamp,
) -> DomainResult<Balance> {
    let mut distributed: HashMap<TransactionId, Amount> = HashMap::new();
    for tx in log {
        if tx.kind() != TransactionType::Commission || tx.status() == TransactionStatus::Failed {
            continue;
        }
        if let Some(sale_id) = tx.sale_reference() {
            let entry = distributed.entry(sale_id).or_insert(Amount::ZERO);
            *entry = entry.checked_add(tx.amount())?;
        }
    }
    fold_balance(
        party_id,
        currency,
        log,
        |sale_id| distributed.get(&sale_id).copied().unwrap_or(Amount::ZERO),
        as_of,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value_objects::PayoutId;
    use std::time::Duration;

    const HOLD: Duration = Duration::from_secs(3 * 24 * 3600);

    fn t0() -> Timestamp {
        Timestamp::from_secs(1_700_000_000).unwrap()
    }

    fn usd(value: &str) -> Amount {
        value.parse().unwrap()
    }

    fn seller() -> PartyId {
        PartyId::new("seller")
    }

    fn sale_log() -> Vec<Transaction> {
        let sale = Transaction::sale(
            TransactionId::new_v4(),
            seller(),
            usd("2000"),
            Currency::usd(),
            t0(),
            t0().add_duration(HOLD),
        )
        .unwrap();
        let support = Transaction::commission(
            PartyId::new("support"),
            sale.id(),
            usd("160"),
            Currency::usd(),
            t0(),
            t0().add_duration(HOLD),
        )
        .unwrap();
        let platform = Transaction::commission(
            PartyId::new("platform"),
            sale.id(),
            usd("100"),
            Currency::usd(),
            t0(),
            t0().add_duration(HOLD),
        )
        .unwrap();
        vec![sale, support, platform]
    }

    #[test]
    fn held_credits_are_pending() {
        let log = sale_log();
        let balance = replay_balance(&seller(), &Currency::usd(), &log, t0()).unwrap();
        assert_eq!(balance.pending, usd("1740"));
        assert_eq!(balance.available, Amount::ZERO);
    }

    #[test]
    fn matured_credits_are_available() {
        let log = sale_log();
        let later = t0().add_duration(HOLD);
        let seller_balance = replay_balance(&seller(), &Currency::usd(), &log, later).unwrap();
        assert_eq!(seller_balance.available, usd("1740"));
        assert_eq!(seller_balance.pending, Amount::ZERO);

        let support = replay_balance(&PartyId::new("support"), &Currency::usd(), &log, later).unwrap();
        assert_eq!(support.available, usd("160"));
    }

    #[test]
    fn payouts_reserve_and_failures_release() {
        let mut log = sale_log();
        let later = t0().add_duration(HOLD);
        let mut debit = Transaction::payout(seller(), PayoutId::new_v4(), usd("500"), Currency::usd(), later).unwrap();
        log.push(debit.clone());

        let reserved = replay_balance(&seller(), &Currency::usd(), &log, later).unwrap();
        assert_eq!(reserved.available, usd("1240"));

        debit.fail(None, later).unwrap();
        log.pop();
        log.push(debit);
        let released = replay_balance(&seller(), &Currency::usd(), &log, later).unwrap();
        assert_eq!(released.available, usd("1740"));
    }

    #[test]
    fn overdrawn_log_is_integrity_error() {
        let mut log = sale_log();
        log.push(Transaction::payout(seller(), PayoutId::new_v4(), usd("1"), Currency::usd(), t0()).unwrap());
        let err = replay_balance(&seller(), &Currency::usd(), &log, t0()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn other_currencies_are_ignored() {
        let log = sale_log();
        let balance = replay_balance(&seller(), &Currency::eur(), &log, t0()).unwrap();
        assert_eq!(balance, Balance::empty(seller(), Currency::eur(), t0()));
    }
}
