//! # In-Memory Party Repository
//!
//! In-memory implementation of [`PartyRepository`].
//!
//! Decisions run under the map's write lock, so two moderators deciding the
//! same party are serialized and exactly one of them sees `Pending`.

use crate::domain::entities::party::Party;
use crate::domain::value_objects::{ApprovalStatus, Decision, ModeratorId, PartyId, Timestamp};
use crate::infrastructure::persistence::traits::{
    DecisionOutcome, PartyRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`PartyRepository`].
#[derive(Debug, Clone)]
pub struct InMemoryPartyRepository {
    storage: Arc<RwLock<HashMap<PartyId, Party>>>,
}

impl InMemoryPartyRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the number of parties in the repository.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage
            .try_read()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    /// Returns true if the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryPartyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartyRepository for InMemoryPartyRepository {
    async fn insert(&self, party: &Party) -> RepositoryResult<()> {
        let mut storage = self.storage.write().await;
        if storage.contains_key(party.id()) {
            return Err(RepositoryError::duplicate("Party", party.id().as_str()));
        }
        storage.insert(party.id().clone(), party.clone());
        Ok(())
    }

    async fn get(&self, id: &PartyId) -> RepositoryResult<Option<Party>> {
        let storage = self.storage.read().await;
        Ok(storage.get(id).cloned())
    }

    async fn decide(
        &self,
        id: &PartyId,
        decision: Decision,
        moderator: ModeratorId,
        at: Timestamp,
    ) -> RepositoryResult<DecisionOutcome> {
        let mut storage = self.storage.write().await;
        let party = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("Party", id.as_str()))?;
        if party.decide(decision, moderator, at).is_err() {
            return Ok(DecisionOutcome::AlreadyDecided(party.clone()));
        }
        Ok(DecisionOutcome::Decided(party.clone()))
    }

    async fn find_by_status(&self, status: ApprovalStatus) -> RepositoryResult<Vec<Party>> {
        let storage = self.storage.read().await;
        let mut parties: Vec<Party> = storage
            .values()
            .filter(|p| p.approval_status() == status)
            .cloned()
            .collect();
        parties.sort_by(|a, b| {
            a.submitted_at()
                .cmp(&b.submitted_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(parties)
    }
}
