//! # Repository Traits
//!
//! Port definitions for persistence abstraction.
//!
//! This module defines the storage ports of the ledger. Implementations can
//! use different backends (relational, in-memory) as long as they provide the
//! atomicity each method documents.
//!
//! # Available Ports
//!
//! - [`LedgerStore`]: Append-only transaction log with derived balances
//! - [`PartyRepository`]: Parties and their moderation state
//! - [`PayoutRepository`]: Payout requests keyed by idempotency key

use crate::domain::entities::party::Party;
use crate::domain::entities::payout_request::PayoutRequest;
use crate::domain::entities::sale::SaleGroup;
use crate::domain::entities::transaction::Transaction;
use crate::domain::errors::DomainError;
use crate::domain::services::balance::Balance;
use crate::domain::value_objects::{
    Amount, ApprovalStatus, Currency, Decision, IdempotencyKey, ModeratorId, PartyId, PayoutId,
    Timestamp, TransactionId, TransactionStatus, TransactionType,
};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Storage failure of a party or payout repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No record under this key.
    #[error("{entity_type} {id} not found")]
    NotFound {
        /// Record kind.
        entity_type: &'static str,
        /// Record key.
        id: String,
    },

    /// A record with this key already exists.
    #[error("{entity_type} {id} already exists")]
    Duplicate {
        /// Record kind.
        entity_type: &'static str,
        /// Record key.
        id: String,
    },

    /// The stored record moved on since it was read.
    #[error("{entity_type} {id} is at version {actual}, expected {expected}")]
    VersionConflict {
        /// Record kind.
        entity_type: &'static str,
        /// Record key.
        id: String,
        /// Version the writer based its change on.
        expected: u64,
        /// Version found in storage.
        actual: u64,
    },

    /// The backing store could not serve the call.
    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// No record under `id`.
    #[must_use]
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// A record under `id` already exists.
    #[must_use]
    pub fn duplicate(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type,
            id: id.into(),
        }
    }

    /// Optimistic concurrency check failed.
    #[must_use]
    pub fn version_conflict(
        entity_type: &'static str,
        id: impl Into<String>,
        expected: u64,
        actual: u64,
    ) -> Self {
        Self::VersionConflict {
            entity_type,
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Backend failure.
    #[must_use]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Returns true for [`RepositoryError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`RepositoryError::Duplicate`].
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Returns true for [`RepositoryError::VersionConflict`].
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Rejections raised by the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A debit would drive the available balance below zero.
    #[error("insufficient balance for {party_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The debited party.
        party_id: PartyId,
        /// Available balance at check time.
        available: Amount,
        /// Requested debit.
        requested: Amount,
    },

    /// A transaction references a party that is not approved.
    #[error("party {0} is not approved")]
    PartyNotApproved(PartyId),

    /// The transaction id is already in the log.
    #[error("duplicate transaction id {0}")]
    DuplicateTransaction(TransactionId),

    /// The payout request already has a pending or completed debit.
    #[error("payout {0} already has a live debit")]
    PayoutAlreadyDebited(PayoutId),

    /// The transaction is not in the settlement currency.
    #[error("currency {actual} is not the settlement currency {expected}")]
    CurrencyMismatch {
        /// Settlement currency.
        expected: Currency,
        /// Offending currency.
        actual: Currency,
    },

    /// The referenced transaction does not exist.
    #[error("transaction {0} not found")]
    UnknownTransaction(TransactionId),

    /// A domain rule was violated.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl LedgerError {
    /// Returns true for an insufficient balance rejection.
    #[must_use]
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, Self::InsufficientBalance { .. })
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Criteria for transaction queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Owning party.
    pub party_id: Option<PartyId>,
    /// Transaction type.
    pub kind: Option<TransactionType>,
    /// Status as observed at query time (held credits past their hold read
    /// as completed).
    pub status: Option<TransactionStatus>,
    /// Earliest creation time, inclusive.
    pub from: Option<Timestamp>,
    /// Latest creation time, inclusive.
    pub to: Option<Timestamp>,
}

impl TransactionFilter {
    /// Returns true if `tx` matches, evaluating status at `as_of`.
    #[must_use]
    pub fn matches(&self, tx: &Transaction, as_of: Timestamp) -> bool {
        self.party_id.as_ref().is_none_or(|p| tx.party_id() == p)
            && self.kind.is_none_or(|k| tx.kind() == k)
            && self.status.is_none_or(|s| tx.effective_status(as_of) == s)
            && self.from.is_none_or(|from| !tx.created_at().is_before(&from))
            && self.to.is_none_or(|to| !tx.created_at().is_after(&to))
    }
}

/// A page of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Total number of matching items.
    pub total: u64,
    /// Offset of the first item.
    pub offset: u64,
    /// Requested page size.
    pub limit: u64,
}

/// Append-only transaction log with derived balances.
///
/// # Atomicity
///
/// - [`append_sale`](LedgerStore::append_sale) commits every transaction of
///   the group or none of them
/// - [`append_debit`](LedgerStore::append_debit) checks the available balance
///   and appends the debit under one per-party lock
/// - multi-party writes lock parties in ascending id order
#[async_trait]
pub trait LedgerStore: Send + Sync + fmt::Debug {
    /// Returns the settlement currency.
    fn currency(&self) -> &Currency;

    /// Atomically appends a sale with its commissions.
    ///
    /// # Errors
    ///
    /// - `LedgerError::PartyNotApproved` if any credited party is not approved
    /// - `LedgerError::DuplicateTransaction` if any id is already recorded
    /// - `LedgerError::CurrencyMismatch` for a foreign currency
    async fn append_sale(&self, group: SaleGroup) -> LedgerResult<()>;

    /// Appends a payout debit if the party's available balance covers it.
    ///
    /// Returns the balance after the debit.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InsufficientBalance` if the debit exceeds `available`
    /// - `LedgerError::PartyNotApproved` if the party is not approved
    /// - `LedgerError::PayoutAlreadyDebited` if a pending or completed debit
    ///   already references the same payout request
    async fn append_debit(&self, debit: Transaction) -> LedgerResult<Balance>;

    /// Marks a pending payout debit completed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownTransaction` if the debit does not exist and
    /// `LedgerError::Domain` if it is not pending.
    async fn complete_debit(
        &self,
        party_id: &PartyId,
        transaction_id: TransactionId,
        provider_reference: Option<String>,
    ) -> LedgerResult<Transaction>;

    /// Marks a pending payout debit failed, releasing its reservation.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownTransaction` if the debit does not exist and
    /// `LedgerError::Domain` if it is not pending.
    async fn fail_debit(
        &self,
        party_id: &PartyId,
        transaction_id: TransactionId,
        provider_reference: Option<String>,
    ) -> LedgerResult<Transaction>;

    /// Derives a party's balance at `as_of`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Domain` if the stored log is inconsistent.
    async fn balance_at(&self, party_id: &PartyId, as_of: Timestamp) -> LedgerResult<Balance>;

    /// Derives a party's balance now.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Domain` if the stored log is inconsistent.
    async fn balance(&self, party_id: &PartyId) -> LedgerResult<Balance> {
        self.balance_at(party_id, Timestamp::now()).await
    }

    /// Gets a transaction by id.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` on storage failure.
    async fn get(&self, transaction_id: TransactionId) -> LedgerResult<Option<Transaction>>;

    /// Queries transactions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` on storage failure.
    async fn query(
        &self,
        filter: &TransactionFilter,
        offset: u64,
        limit: u64,
    ) -> LedgerResult<Page<Transaction>>;

    /// Returns the complete log in append order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` on storage failure.
    async fn log(&self) -> LedgerResult<Vec<Transaction>>;

    /// Sums the non-failed sales referred by `support_structure` created in
    /// `[since, until]`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Domain` on arithmetic overflow.
    async fn referred_volume(
        &self,
        support_structure: &PartyId,
        since: Timestamp,
        until: Timestamp,
    ) -> LedgerResult<Amount>;

    /// Completes every held credit whose hold has elapsed by `as_of`.
    ///
    /// Returns how many transactions were released.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` on storage failure.
    async fn release_matured(&self, as_of: Timestamp) -> LedgerResult<usize>;
}

/// Result of an atomic moderation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The decision was applied.
    Decided(Party),
    /// The party had already left `Pending`; nothing changed.
    AlreadyDecided(Party),
}

/// Repository for parties.
#[async_trait]
pub trait PartyRepository: Send + Sync + fmt::Debug {
    /// Inserts a new party.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Duplicate` if the id is taken.
    async fn insert(&self, party: &Party) -> RepositoryResult<()>;

    /// Gets a party by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn get(&self, id: &PartyId) -> RepositoryResult<Option<Party>>;

    /// Applies a decision as a single compare-and-set on `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the party does not exist.
    async fn decide(
        &self,
        id: &PartyId,
        decision: Decision,
        moderator: ModeratorId,
        at: Timestamp,
    ) -> RepositoryResult<DecisionOutcome>;

    /// Lists parties with the given status, oldest submission first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn find_by_status(&self, status: ApprovalStatus) -> RepositoryResult<Vec<Party>>;

    /// Returns true if the party exists and is approved.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn is_approved(&self, id: &PartyId) -> RepositoryResult<bool> {
        Ok(self.get(id).await?.is_some_and(|p| p.is_approved()))
    }
}

/// Result of an idempotent payout insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutInsert {
    /// The request was stored.
    Inserted(PayoutRequest),
    /// A request with the same party and key already exists.
    Existing(PayoutRequest),
}

/// Repository for payout requests.
#[async_trait]
pub trait PayoutRepository: Send + Sync + fmt::Debug {
    /// Stores the request unless `(party_id, idempotency_key)` is taken, in
    /// which case the existing request is returned. Check and insert are one
    /// atomic step.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn insert_if_absent(&self, request: &PayoutRequest) -> RepositoryResult<PayoutInsert>;

    /// Overwrites a stored request whose stored version is one behind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown request and
    /// `RepositoryError::VersionConflict` if it was modified concurrently.
    async fn update(&self, request: &PayoutRequest) -> RepositoryResult<()>;

    /// Gets a request by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn get(&self, id: PayoutId) -> RepositoryResult<Option<PayoutRequest>>;

    /// Finds a request by its idempotency key.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn find_by_key(
        &self,
        party_id: &PartyId,
        key: &IdempotencyKey,
    ) -> RepositoryResult<Option<PayoutRequest>>;

    /// Lists a party's requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn find_by_party(&self, party_id: &PartyId) -> RepositoryResult<Vec<PayoutRequest>>;
}
