//! # Ledger Transactions
//!
//! Immutable-amount entries of the append-only ledger. Only the status (and
//! the provider reference of payout debits) ever changes after a transaction
//! is recorded.
//!
//! Credits ([`TransactionType::Sale`], [`TransactionType::Commission`]) are
//! held as `Pending` until their `available_at` instant, after which they
//! count as available funds. `created_at` is when the sale happened;
//! `available_at` is derived from when the ledger committed it. Debits ([`TransactionType::Payout`]) reserve
//! funds as soon as they are recorded.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    Amount, Currency, PartyId, PayoutId, Timestamp, TransactionId, TransactionStatus,
    TransactionType,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Link from a transaction to the record it derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionReference {
    /// A commission credit derived from a sale.
    Sale(TransactionId),
    /// A payout debit created for a payout request.
    PayoutRequest(PayoutId),
}

impl fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sale(id) => write!(f, "sale:{id}"),
            Self::PayoutRequest(id) => write!(f, "payout:{id}"),
        }
    }
}

/// A single ledger entry owned by one party.
///
/// # Invariants
///
/// - `amount > 0`
/// - commission transactions reference a sale
/// - payout transactions reference a payout request
/// - status transitions follow [`TransactionStatus::can_transition_to`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionType,
    party_id: PartyId,
    amount: Amount,
    currency: Currency,
    status: TransactionStatus,
    reference: Option<TransactionReference>,
    created_at: Timestamp,
    available_at: Timestamp,
    provider_reference: Option<String>,
    updated_at: Timestamp,
}

impl Transaction {
    /// Records the gross sale credit for a seller.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the amount is zero and a
    /// validation error if `available_at` precedes `at`.
    pub fn sale(
        id: TransactionId,
        seller: PartyId,
        amount: Amount,
        currency: Currency,
        at: Timestamp,
        available_at: Timestamp,
    ) -> DomainResult<Self> {
        Self::credit(id, TransactionType::Sale, seller, amount, currency, None, at, available_at)
    }

    /// Records a commission credit derived from `sale_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the amount is zero and a
    /// validation error if `available_at` precedes `at`.
    pub fn commission(
        party_id: PartyId,
        sale_id: TransactionId,
        amount: Amount,
        currency: Currency,
        at: Timestamp,
        available_at: Timestamp,
    ) -> DomainResult<Self> {
        Self::credit(
            TransactionId::new_v4(),
            TransactionType::Commission,
            party_id,
            amount,
            currency,
            Some(TransactionReference::Sale(sale_id)),
            at,
            available_at,
        )
    }

    /// Records a payout debit for a payout request. The debit is pending
    /// until the processor confirms it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the amount is zero.
    pub fn payout(
        party_id: PartyId,
        payout_id: PayoutId,
        amount: Amount,
        currency: Currency,
        at: Timestamp,
    ) -> DomainResult<Self> {
        ensure_positive(amount)?;
        Ok(Self {
            id: TransactionId::new_v4(),
            kind: TransactionType::Payout,
            party_id,
            amount,
            currency,
            status: TransactionStatus::Pending,
            reference: Some(TransactionReference::PayoutRequest(payout_id)),
            created_at: at,
            available_at: at,
            provider_reference: None,
            updated_at: at,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn credit(
        id: TransactionId,
        kind: TransactionType,
        party_id: PartyId,
        amount: Amount,
        currency: Currency,
        reference: Option<TransactionReference>,
        at: Timestamp,
        available_at: Timestamp,
    ) -> DomainResult<Self> {
        ensure_positive(amount)?;
        if available_at.is_before(&at) {
            return Err(DomainError::validation(
                "a credit cannot become available before it occurred",
            ));
        }
        Ok(Self {
            id,
            kind,
            party_id,
            amount,
            currency,
            status: TransactionStatus::Pending,
            reference,
            created_at: at,
            available_at,
            provider_reference: None,
            updated_at: at,
        })
    }

    /// Marks the transaction completed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` unless the transaction is
    /// pending.
    pub fn complete(&mut self, provider_reference: Option<String>, at: Timestamp) -> DomainResult<()> {
        self.transition_to(TransactionStatus::Completed, at)?;
        if provider_reference.is_some() {
            self.provider_reference = provider_reference;
        }
        Ok(())
    }

    /// Marks the transaction failed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` unless the transaction is
    /// pending.
    pub fn fail(&mut self, provider_reference: Option<String>, at: Timestamp) -> DomainResult<()> {
        self.transition_to(TransactionStatus::Failed, at)?;
        if provider_reference.is_some() {
            self.provider_reference = provider_reference;
        }
        Ok(())
    }

    fn transition_to(&mut self, target: TransactionStatus, at: Timestamp) -> DomainResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidStateTransition {
                entity: "transaction",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = at;
        Ok(())
    }

    /// Completes a held credit whose hold has elapsed by `as_of`.
    ///
    /// Returns true if the status changed.
    pub fn release_if_due(&mut self, as_of: Timestamp) -> bool {
        if self.is_hold_elapsed(as_of) {
            self.status = TransactionStatus::Completed;
            self.updated_at = as_of;
            return true;
        }
        false
    }

    /// Returns true for a pending credit whose hold has elapsed.
    #[must_use]
    pub fn is_hold_elapsed(&self, as_of: Timestamp) -> bool {
        self.kind.is_credit()
            && self.status == TransactionStatus::Pending
            && !self.available_at.is_after(&as_of)
    }

    /// Returns the status as observed at `as_of`: a pending credit past its
    /// hold reads as completed even before the sweep has touched it.
    #[must_use]
    pub fn effective_status(&self, as_of: Timestamp) -> TransactionStatus {
        if self.is_hold_elapsed(as_of) {
            TransactionStatus::Completed
        } else {
            self.status
        }
    }

    /// Returns the sale a commission derives from.
    #[must_use]
    pub fn sale_reference(&self) -> Option<TransactionId> {
        match self.reference {
            Some(TransactionReference::Sale(id)) => Some(id),
            _ => None,
        }
    }

    /// Returns the payout request a debit belongs to.
    #[must_use]
    pub fn payout_reference(&self) -> Option<PayoutId> {
        match self.reference {
            Some(TransactionReference::PayoutRequest(id)) => Some(id),
            _ => None,
        }
    }

    /// Returns the transaction ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the transaction type.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    /// Returns the owning party.
    #[inline]
    #[must_use]
    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    /// Returns the amount.
    #[inline]
    #[must_use]
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// Returns the currency.
    #[inline]
    #[must_use]
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Returns the stored status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Returns the reference, if any.
    #[inline]
    #[must_use]
    pub fn reference(&self) -> Option<TransactionReference> {
        self.reference
    }

    /// Returns when the transaction was recorded.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns when a credit becomes available.
    #[inline]
    #[must_use]
    pub fn available_at(&self) -> Timestamp {
        self.available_at
    }

    /// Returns the processor reference of a payout debit.
    #[inline]
    #[must_use]
    pub fn provider_reference(&self) -> Option<&str> {
        self.provider_reference.as_deref()
    }

    /// Returns when the transaction last changed.
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}

fn ensure_positive(amount: Amount) -> DomainResult<()> {
    if amount.is_zero() {
        return Err(DomainError::InvalidAmount(
            "transaction amount must be positive".to_string(),
        ));
    }
    Ok(())
}
