//! # Payout Request Aggregate
//!
//! A party's request to withdraw available funds through the payment
//! processor.
//!
//! # State Machine
//!
//! ```text
//! Pending → Processing → Completed
//!    │           └─────→ Failed
//!    └─────────────────→ Failed
//! ```
//!
//! A request leaves `Pending` only after its debit transaction has been
//! appended to the ledger. Terminal requests are never mutated again, except
//! for the reconciliation note attached when a processor reports a late
//! success for a request that had already failed locally.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    Amount, Currency, IdempotencyKey, PartyId, PayoutId, PayoutStatus, Timestamp, TransactionId,
};
use serde::{Deserialize, Serialize};

/// Outcome of reconciling a late processor success against a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LateSettlement {
    /// A corrective debit was booked.
    Corrected {
        /// The corrective payout transaction.
        transaction_id: TransactionId,
        /// Processor reference reported with the late success.
        provider_reference: String,
        /// When the correction was booked.
        at: Timestamp,
    },
    /// Funds were no longer available; the request needs manual review.
    ManualReview {
        /// Processor reference reported with the late success.
        provider_reference: String,
        /// When the mismatch was detected.
        at: Timestamp,
    },
}

/// A withdrawal request.
///
/// # Invariants
///
/// - `amount > 0`
/// - `transaction_id` is set once the request reaches `Processing`
/// - the `(party_id, idempotency_key)` pair is unique across requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    id: PayoutId,
    party_id: PartyId,
    amount: Amount,
    currency: Currency,
    idempotency_key: IdempotencyKey,
    status: PayoutStatus,
    transaction_id: Option<TransactionId>,
    provider_reference: Option<String>,
    failure_reason: Option<String>,
    late_settlement: Option<LateSettlement>,
    created_at: Timestamp,
    updated_at: Timestamp,
    version: u64,
}

impl PayoutRequest {
    /// Creates a new pending request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAmount` if the amount is zero and
    /// `DomainError::ValidationError` if the idempotency key is blank.
    pub fn new(
        party_id: PartyId,
        amount: Amount,
        currency: Currency,
        idempotency_key: IdempotencyKey,
        at: Timestamp,
    ) -> DomainResult<Self> {
        if amount.is_zero() {
            return Err(DomainError::InvalidAmount(
                "payout amount must be positive".to_string(),
            ));
        }
        if idempotency_key.is_blank() {
            return Err(DomainError::validation("idempotency key must not be blank"));
        }
        Ok(Self {
            id: PayoutId::new_v4(),
            party_id,
            amount,
            currency,
            idempotency_key,
            status: PayoutStatus::Pending,
            transaction_id: None,
            provider_reference: None,
            failure_reason: None,
            late_settlement: None,
            created_at: at,
            updated_at: at,
            version: 1,
        })
    }

    /// Moves the request to `Processing` once its debit has been recorded.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` unless pending.
    pub fn start_processing(&mut self, transaction_id: TransactionId, at: Timestamp) -> DomainResult<()> {
        self.transition_to(PayoutStatus::Processing, at)?;
        self.transaction_id = Some(transaction_id);
        Ok(())
    }

    /// Marks the request completed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` unless processing.
    pub fn complete(&mut self, provider_reference: String, at: Timestamp) -> DomainResult<()> {
        self.transition_to(PayoutStatus::Completed, at)?;
        self.provider_reference = Some(provider_reference);
        Ok(())
    }

    /// Marks the request failed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` if already terminal.
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        provider_reference: Option<String>,
        at: Timestamp,
    ) -> DomainResult<()> {
        self.transition_to(PayoutStatus::Failed, at)?;
        self.failure_reason = Some(reason.into());
        if provider_reference.is_some() {
            self.provider_reference = provider_reference;
        }
        Ok(())
    }

    /// Attaches the result of reconciling a late processor success.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidStateTransition` unless the request failed,
    /// and `DomainError::ValidationError` if it was already reconciled.
    pub fn record_late_settlement(&mut self, settlement: LateSettlement, at: Timestamp) -> DomainResult<()> {
        if self.status != PayoutStatus::Failed {
            return Err(DomainError::InvalidStateTransition {
                entity: "payout request",
                from: self.status.to_string(),
                to: "RECONCILED".to_string(),
            });
        }
        if self.late_settlement.is_some() {
            return Err(DomainError::validation("payout request already reconciled"));
        }
        self.late_settlement = Some(settlement);
        self.touch(at);
        Ok(())
    }

    fn transition_to(&mut self, target: PayoutStatus, at: Timestamp) -> DomainResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidStateTransition {
                entity: "payout request",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.touch(at);
        Ok(())
    }

    fn touch(&mut self, at: Timestamp) {
        self.updated_at = at;
        self.version = self.version.saturating_add(1);
    }

    /// Returns the request ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> PayoutId {
        self.id
    }

    /// Returns the requesting party.
    #[inline]
    #[must_use]
    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    /// Returns the requested amount.
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

    /// Returns the idempotency key.
    #[inline]
    #[must_use]
    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    /// Returns the status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> PayoutStatus {
        self.status
    }

    /// Returns the debit transaction, once recorded.
    #[inline]
    #[must_use]
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    /// Returns the processor reference, if any.
    #[inline]
    #[must_use]
    pub fn provider_reference(&self) -> Option<&str> {
        self.provider_reference.as_deref()
    }

    /// Returns why the request failed, if it did.
    #[inline]
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the reconciliation note, if any.
    #[inline]
    #[must_use]
    pub fn late_settlement(&self) -> Option<&LateSettlement> {
        self.late_settlement.as_ref()
    }

    /// Returns when the request was created.
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns when the request last changed.
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns the record version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the request is terminal.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
