//! # Ledger Events
//!
//! Domain events for sale settlement, moderation and payouts.
//!
//! # Event Flow
//!
//! ```text
//! PartySubmitted -> PartyDecided
//! SaleSettled
//! PayoutCompleted | PayoutFailed -> PayoutReconciled
//! ```

use crate::domain::entities::payout_request::LateSettlement;
use crate::domain::events::domain_event::{DomainEvent, EventMetadata, EventType};
use crate::domain::value_objects::timestamp::Timestamp;
use crate::domain::value_objects::{
    Amount, ApprovalStatus, Currency, EventId, ModeratorId, PartyId, PartyKind, PayoutId,
    RateSource, TransactionId,
};
use serde::{Deserialize, Serialize};

macro_rules! impl_domain_event {
    ($event:ty, $event_type:expr, $name:literal) => {
        impl DomainEvent for $event {
            fn event_id(&self) -> EventId {
                self.metadata.event_id
            }

            fn party_id(&self) -> &PartyId {
                &self.metadata.party_id
            }

            fn timestamp(&self) -> Timestamp {
                self.metadata.timestamp
            }

            fn event_type(&self) -> EventType {
                $event_type
            }

            fn event_name(&self) -> &'static str {
                $name
            }
        }
    };
}

/// A commission credited to one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionCredit {
    /// The credited party.
    pub party_id: PartyId,
    /// The credited amount.
    pub amount: Amount,
}

/// Event emitted when a sale and its commissions are committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSettled {
    /// Event metadata (party = seller).
    pub metadata: EventMetadata,
    /// The sale transaction.
    pub sale_id: TransactionId,
    /// Gross sale amount.
    pub amount: Amount,
    /// Sale currency.
    pub currency: Currency,
    /// Where the applied rate came from.
    pub rate_source: RateSource,
    /// Commission credits, support structures first, platform last.
    pub commissions: Vec<CommissionCredit>,
}

impl SaleSettled {
    /// Creates a new SaleSettled event.
    #[must_use]
    pub fn new(
        seller: PartyId,
        sale_id: TransactionId,
        amount: Amount,
        currency: Currency,
        rate_source: RateSource,
        commissions: Vec<CommissionCredit>,
    ) -> Self {
        Self {
            metadata: EventMetadata::for_party(seller),
            sale_id,
            amount,
            currency,
            rate_source,
            commissions,
        }
    }
}

impl_domain_event!(SaleSettled, EventType::Sale, "SaleSettled");

/// Event emitted when a party is submitted for moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySubmitted {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The kind of party.
    pub kind: PartyKind,
}

impl PartySubmitted {
    /// Creates a new PartySubmitted event.
    #[must_use]
    pub fn new(party_id: PartyId, kind: PartyKind) -> Self {
        Self {
            metadata: EventMetadata::for_party(party_id),
            kind,
        }
    }
}

impl_domain_event!(PartySubmitted, EventType::Approval, "PartySubmitted");

/// Event emitted when a moderator decides on a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDecided {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The resulting status.
    pub status: ApprovalStatus,
    /// Who decided.
    pub moderator: ModeratorId,
}

impl PartyDecided {
    /// Creates a new PartyDecided event.
    #[must_use]
    pub fn new(party_id: PartyId, status: ApprovalStatus, moderator: ModeratorId) -> Self {
        Self {
            metadata: EventMetadata::for_party(party_id),
            status,
            moderator,
        }
    }
}

impl_domain_event!(PartyDecided, EventType::Approval, "PartyDecided");

/// Event emitted when the processor confirms a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutCompleted {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The payout request.
    pub payout_id: PayoutId,
    /// Paid amount.
    pub amount: Amount,
    /// Currency.
    pub currency: Currency,
    /// Processor reference.
    pub provider_reference: String,
}

impl PayoutCompleted {
    /// Creates a new PayoutCompleted event.
    #[must_use]
    pub fn new(
        party_id: PartyId,
        payout_id: PayoutId,
        amount: Amount,
        currency: Currency,
        provider_reference: String,
    ) -> Self {
        Self {
            metadata: EventMetadata::for_party(party_id),
            payout_id,
            amount,
            currency,
            provider_reference,
        }
    }
}

impl_domain_event!(PayoutCompleted, EventType::Payout, "PayoutCompleted");

/// Event emitted when a payout fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutFailed {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The payout request.
    pub payout_id: PayoutId,
    /// Requested amount.
    pub amount: Amount,
    /// Failure reason.
    pub reason: String,
}

impl PayoutFailed {
    /// Creates a new PayoutFailed event.
    #[must_use]
    pub fn new(party_id: PartyId, payout_id: PayoutId, amount: Amount, reason: impl Into<String>) -> Self {
        Self {
            metadata: EventMetadata::for_party(party_id),
            payout_id,
            amount,
            reason: reason.into(),
        }
    }
}

impl_domain_event!(PayoutFailed, EventType::Payout, "PayoutFailed");

/// Event emitted when a late processor success is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReconciled {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// The payout request.
    pub payout_id: PayoutId,
    /// What reconciliation did.
    pub outcome: LateSettlement,
}

impl PayoutReconciled {
    /// Creates a new PayoutReconciled event.
    #[must_use]
    pub fn new(party_id: PartyId, payout_id: PayoutId, outcome: LateSettlement) -> Self {
        Self {
            metadata: EventMetadata::for_party(party_id),
            payout_id,
            outcome,
        }
    }
}

impl_domain_event!(PayoutReconciled, EventType::Payout, "PayoutReconciled");

/// Enum containing all ledger events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    /// A sale was settled.
    SaleSettled(SaleSettled),
    /// A party was submitted for moderation.
    PartySubmitted(PartySubmitted),
    /// A party was approved or rejected.
    PartyDecided(PartyDecided),
    /// A payout completed.
    PayoutCompleted(PayoutCompleted),
    /// A payout failed.
    PayoutFailed(PayoutFailed),
    /// A late processor result was reconciled.
    PayoutReconciled(PayoutReconciled),
}

impl LedgerEvent {
    fn inner(&self) -> &dyn DomainEvent {
        match self {
            Self::SaleSettled(e) => e,
            Self::PartySubmitted(e) => e,
            Self::PartyDecided(e) => e,
            Self::PayoutCompleted(e) => e,
            Self::PayoutFailed(e) => e,
            Self::PayoutReconciled(e) => e,
        }
    }
}

impl DomainEvent for LedgerEvent {
    fn event_id(&self) -> EventId {
        self.inner().event_id()
    }

    fn party_id(&self) -> &PartyId {
        self.inner().party_id()
    }

    fn timestamp(&self) -> Timestamp {
        self.inner().timestamp()
    }

    fn event_type(&self) -> EventType {
        self.inner().event_type()
    }

    fn event_name(&self) -> &'static str {
        self.inner().event_name()
    }
}

macro_rules! impl_from_event {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for LedgerEvent {
                fn from(event: $variant) -> Self {
                    Self::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    SaleSettled,
    PartySubmitted,
    PartyDecided,
    PayoutCompleted,
    PayoutFailed,
    PayoutReconciled,
);
