//! # In-Memory Payout Repository
//!
//! In-memory implementation of [`PayoutRepository`].
//!
//! Requests are indexed by id and by `(party, idempotency key)`. Both maps
//! sit behind one lock so the idempotent insert is a single atomic step.

use crate::domain::entities::payout_request::PayoutRequest;
use crate::domain::value_objects::{IdempotencyKey, PartyId, PayoutId};
use crate::infrastructure::persistence::traits::{
    PayoutInsert, PayoutRepository, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct PayoutStorage {
    requests: HashMap<PayoutId, PayoutRequest>,
    keys: HashMap<(PartyId, IdempotencyKey), PayoutId>,
}

/// In-memory implementation of [`PayoutRepository`].
#[derive(Debug, Clone)]
pub struct InMemoryPayoutRepository {
    storage: Arc<RwLock<PayoutStorage>>,
}

impl InMemoryPayoutRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(PayoutStorage::default())),
        }
    }

    /// Returns the number of stored requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage
            .try_read()
            .map(|guard| guard.requests.len())
            .unwrap_or(0)
    }

    /// Returns true if the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryPayoutRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PayoutRepository for InMemoryPayoutRepository {
    async fn insert_if_absent(&self, request: &PayoutRequest) -> RepositoryResult<PayoutInsert> {
        let mut storage = self.storage.write().await;
        let key = (
            request.party_id().clone(),
            request.idempotency_key().clone(),
        );
        if let Some(existing) = storage.keys.get(&key).and_then(|id| storage.requests.get(id)) {
            return Ok(PayoutInsert::Existing(existing.clone()));
        }
        if storage.requests.contains_key(&request.id()) {
            return Err(RepositoryError::duplicate(
                "PayoutRequest",
                request.id().to_string(),
            ));
        }
        storage.keys.insert(key, request.id());
        storage.requests.insert(request.id(), request.clone());
        Ok(PayoutInsert::Inserted(request.clone()))
    }

    async fn update(&self, request: &PayoutRequest) -> RepositoryResult<()> {
        let mut storage = self.storage.write().await;
        let stored = storage
            .requests
            .get_mut(&request.id())
            .ok_or_else(|| RepositoryError::not_found("PayoutRequest", request.id().to_string()))?;
        let expected = request.version().saturating_sub(1);
        if stored.version() != expected {
            return Err(RepositoryError::version_conflict(
                "PayoutRequest",
                request.id().to_string(),
                expected,
                stored.version(),
            ));
        }
        *stored = request.clone();
        Ok(())
    }

    async fn get(&self, id: PayoutId) -> RepositoryResult<Option<PayoutRequest>> {
        let storage = self.storage.read().await;
        Ok(storage.requests.get(&id).cloned())
    }

    async fn find_by_key(
        &self,
        party_id: &PartyId,
        key: &IdempotencyKey,
    ) -> RepositoryResult<Option<PayoutRequest>> {
        let storage = self.storage.read().await;
        Ok(storage
            .keys
            .get(&(party_id.clone(), key.clone()))
            .and_then(|id| storage.requests.get(id))
            .cloned())
    }

    async fn find_by_party(&self, party_id: &PartyId) -> RepositoryResult<Vec<PayoutRequest>> {
        let storage = self.storage.read().await;
        let mut requests: Vec<PayoutRequest> = storage
            .requests
            .values()
            .filter(|r| r.party_id() == party_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(requests)
    }
}
