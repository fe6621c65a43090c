//! # Approval Queue
//!
//! Moderation of sellers and support structures. A party is submitted as
//! `Pending` and decided exactly once; later decisions are reported back
//! with the state that won.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::party::Party;
use crate::domain::events::{PartyDecided, PartySubmitted};
use crate::domain::value_objects::{ApprovalStatus, Decision, ModeratorId, PartyId, PartyKind, Timestamp};
use crate::infrastructure::notifications::Notifier;
use crate::infrastructure::persistence::{DecisionOutcome, PartyRepository};
use std::sync::Arc;
use tracing::{info, instrument};

/// Moderation queue over a [`PartyRepository`].
#[derive(Debug)]
pub struct ApprovalQueue {
    parties: Arc<dyn PartyRepository>,
    notifier: Notifier,
}

impl ApprovalQueue {
    /// Creates a new queue.
    #[must_use]
    pub fn new(parties: Arc<dyn PartyRepository>, notifier: Notifier) -> Self {
        Self { parties, notifier }
    }

    /// Submits a party for approval.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::Validation` for blank fields or a platform kind
    /// - `ApplicationError::Conflict` if the id is already registered
    #[instrument(skip(self, display_name), fields(party_id = %id, kind = %kind))]
    pub async fn submit(
        &self,
        id: PartyId,
        kind: PartyKind,
        display_name: impl Into<String>,
    ) -> ApplicationResult<Party> {
        let party = Party::new(id, kind, display_name)?;
        self.parties.insert(&party).await?;

        info!("Party submitted for approval");
        self.notifier
            .publish(PartySubmitted::new(party.id().clone(), party.kind()));
        Ok(party)
    }

    /// Approves or rejects a pending party.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::NotFound` if the party does not exist
    /// - `ApplicationError::AlreadyDecided` if it is no longer pending; the
    ///   error carries the current state and nothing changed
    #[instrument(skip(self), fields(party_id = %id, decision = %decision, moderator = %moderator))]
    pub async fn decide(
        &self,
        id: &PartyId,
        decision: Decision,
        moderator: ModeratorId,
    ) -> ApplicationResult<Party> {
        match self
            .parties
            .decide(id, decision, moderator.clone(), Timestamp::now())
            .await?
        {
            DecisionOutcome::Decided(party) => {
                info!(status = %party.approval_status(), "Party decided");
                self.notifier.publish(PartyDecided::new(
                    party.id().clone(),
                    party.approval_status(),
                    moderator,
                ));
                Ok(party)
            }
            DecisionOutcome::AlreadyDecided(party) => {
                info!(status = %party.approval_status(), "Decision ignored, party already decided");
                Err(ApplicationError::already_decided(party))
            }
        }
    }

    /// Lists pending parties, oldest submission first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_pending(&self) -> ApplicationResult<Vec<Party>> {
        Ok(self.parties.find_by_status(ApprovalStatus::Pending).await?)
    }

    /// Gets a party.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::NotFound` if the party does not exist.
    pub async fn get(&self, id: &PartyId) -> ApplicationResult<Party> {
        self.parties
            .get(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Party", id.as_str()))
    }
}
