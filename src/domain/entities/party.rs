//! # Party Aggregate
//!
//! A seller, support structure or the platform operator, together with its
//! moderation state.
//!
//! # State Machine
//!
//! ```text
//! Pending → Approved
//!    └────→ Rejected
//! ```
//!
//! The transition happens exactly once. A second decision is reported as
//! [`DomainError::AlreadyDecided`] and leaves the party untouched.
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::domain::entities::party::Party;
//! use settlement_ledger::domain::value_objects::{
//!     ApprovalStatus, Decision, ModeratorId, PartyId, PartyKind, Timestamp,
//! };
//!
//! let mut party = Party::new(PartyId::new("startup-1"), PartyKind::Seller, "Acme").unwrap();
//! party.decide(Decision::Approve, ModeratorId::new("admin-a"), Timestamp::now()).unwrap();
//!
//! assert_eq!(party.approval_status(), ApprovalStatus::Approved);
//! assert!(party.decide(Decision::Reject, ModeratorId::new("admin-b"), Timestamp::now()).is_err());
//! ```

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{
    ApprovalStatus, Decision, ModeratorId, PartyId, PartyKind, Timestamp,
};
use serde::{Deserialize, Serialize};

/// A marketplace participant eligible (once approved) for settlement.
///
/// # Invariants
///
/// - `id` and `display_name` are non-blank
/// - `decided_by`/`decided_at` are set iff the status is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    id: PartyId,
    kind: PartyKind,
    display_name: String,
    approval_status: ApprovalStatus,
    submitted_at: Timestamp,
    decided_by: Option<ModeratorId>,
    decided_at: Option<Timestamp>,
    version: u64,
}

impl Party {
    /// Creates a party awaiting moderation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationError` if the id or name is blank, or if
    /// the kind is [`PartyKind::Platform`] (the operator is provisioned with
    /// [`Party::platform`], not moderated).
    pub fn new(
        id: PartyId,
        kind: PartyKind,
        display_name: impl Into<String>,
    ) -> DomainResult<Self> {
        let display_name = display_name.into();
        if id.is_blank() {
            return Err(DomainError::validation("party id must not be blank"));
        }
        if display_name.trim().is_empty() {
            return Err(DomainError::validation("display name must not be blank"));
        }
        if !kind.requires_moderation() {
            return Err(DomainError::validation(
                "platform parties are provisioned, not submitted for approval",
            ));
        }
        Ok(Self {
            id,
            kind,
            display_name,
            approval_status: ApprovalStatus::Pending,
            submitted_at: Timestamp::now(),
            decided_by: None,
            decided_at: None,
            version: 1,
        })
    }

    /// Provisions the platform operator account, approved from the start
    /// by [`ModeratorId::system`].
    #[must_use]
    pub fn platform(id: PartyId, display_name: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            kind: PartyKind::Platform,
            display_name: display_name.into(),
            approval_status: ApprovalStatus::Approved,
            submitted_at: now,
            decided_by: Some(ModeratorId::system()),
            decided_at: Some(now),
            version: 1,
        }
    }

    /// Applies a moderator decision.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyDecided` if the party is not pending; the
    /// party is left unchanged.
    pub fn decide(
        &mut self,
        decision: Decision,
        moderator: ModeratorId,
        at: Timestamp,
    ) -> DomainResult<()> {
        let target = decision.target_status();
        if !self.approval_status.can_transition_to(target) {
            return Err(DomainError::AlreadyDecided {
                party_id: self.id.clone(),
                status: self.approval_status,
            });
        }
        self.approval_status = target;
        self.decided_by = Some(moderator);
        self.decided_at = Some(at);
        self.version = self.version.saturating_add(1);
        Ok(())
    }

    /// Returns the party ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &PartyId {
        &self.id
    }

    /// Returns the party kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    /// Returns the display name.
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the moderation status.
    #[inline]
    #[must_use]
    pub fn approval_status(&self) -> ApprovalStatus {
        self.approval_status
    }

    /// Returns when the party was submitted.
    #[inline]
    #[must_use]
    pub fn submitted_at(&self) -> Timestamp {
        self.submitted_at
    }

    /// Returns the moderator who decided, if any.
    #[inline]
    #[must_use]
    pub fn decided_by(&self) -> Option<&ModeratorId> {
        self.decided_by.as_ref()
    }

    /// Returns when the decision was taken, if any.
    #[inline]
    #[must_use]
    pub fn decided_at(&self) -> Option<Timestamp> {
        self.decided_at
    }

    /// Returns the record version.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if the party may take part in new transactions.
    #[inline]
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }

    /// Returns true if the party still awaits moderation.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.approval_status == ApprovalStatus::Pending
    }
}
