//! # Payout Workflow
//!
//! Drives a withdrawal from request to a terminal state.
//!
//! ```text
//! request ──► dedupe on (party, key) ──► balance pre-check
//!         ──► persist Pending ──► append debit (atomic balance check)
//!         ──► Processing ──► processor (bounded by timeout)
//!                 ├─ success ──► debit Completed, request Completed
//!                 └─ decline / error / timeout ──► debit Failed, request Failed
//! ```
//!
//! A request that reached the processor always ends `Completed` or `Failed`
//! and is returned as `Ok`; callers inspect its status. A request rejected
//! before the debit is recorded returns an error and moves no money.
//!
//! Everything from persisting the request onwards runs on its own task.
//! Dropping the caller's future, as axum does when a client disconnects,
//! does not stop it, so a reserved debit is always settled or released
//! within the processor timeout.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::payout_request::PayoutRequest;
use crate::domain::entities::transaction::Transaction;
use crate::domain::events::{PayoutCompleted, PayoutFailed};
use crate::domain::value_objects::{
    Amount, IdempotencyKey, PartyId, PayoutId, Timestamp, TransactionId,
};
use crate::infrastructure::notifications::Notifier;
use crate::infrastructure::persistence::{
    LedgerError, LedgerStore, PartyRepository, PayoutInsert, PayoutRepository,
};
use crate::infrastructure::processor::{PaymentProcessor, PayoutSubmission, ProcessorOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, instrument, warn};

/// Default deadline for a processor call.
pub const DEFAULT_PROCESSOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs payout requests against the ledger and the payment processor.
#[derive(Debug)]
pub struct PayoutWorkflow {
    parties: Arc<dyn PartyRepository>,
    execution: Execution,
}

/// The part of the workflow that owns money once a request is persisted.
#[derive(Debug, Clone)]
struct Execution {
    ledger: Arc<dyn LedgerStore>,
    payouts: Arc<dyn PayoutRepository>,
    processor: Arc<dyn PaymentProcessor>,
    notifier: Notifier,
    processor_timeout: Duration,
}

impl PayoutWorkflow {
    /// Creates a workflow with the default processor timeout.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        payouts: Arc<dyn PayoutRepository>,
        parties: Arc<dyn PartyRepository>,
        processor: Arc<dyn PaymentProcessor>,
        notifier: Notifier,
    ) -> Self {
        Self {
            parties,
            execution: Execution {
                ledger,
                payouts,
                processor,
                notifier,
                processor_timeout: DEFAULT_PROCESSOR_TIMEOUT,
            },
        }
    }

    /// Sets the processor deadline.
    #[must_use]
    pub fn with_processor_timeout(mut self, timeout: Duration) -> Self {
        self.execution.processor_timeout = timeout;
        self
    }

    /// Returns the processor deadline.
    #[inline]
    #[must_use]
    pub fn processor_timeout(&self) -> Duration {
        self.execution.processor_timeout
    }

    /// Requests a payout of `amount` for `party_id`.
    ///
    /// Reusing an idempotency key returns the request it created, whatever
    /// its state, without touching the ledger or the processor.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::Validation` for a zero amount, a blank key or an
    ///   unknown party
    /// - `ApplicationError::NotApproved` if the party may not transact
    /// - `ApplicationError::InsufficientBalance` if the available balance is
    ///   short, at pre-check or at debit time
    #[instrument(skip(self), fields(party_id = %party_id, amount = %amount, key = %idempotency_key))]
    pub async fn request_payout(
        &self,
        party_id: PartyId,
        amount: Amount,
        idempotency_key: IdempotencyKey,
    ) -> ApplicationResult<PayoutRequest> {
        let ledger = &self.execution.ledger;
        if let Some(existing) = self
            .execution
            .payouts
            .find_by_key(&party_id, &idempotency_key)
            .await?
        {
            info!(payout_id = %existing.id(), status = %existing.status(), "Idempotent replay");
            return Ok(existing);
        }

        let party = self
            .parties
            .get(&party_id)
            .await?
            .ok_or_else(|| ApplicationError::validation(format!("unknown party {party_id}")))?;
        if !party.is_approved() {
            return Err(ApplicationError::NotApproved(party_id));
        }

        let now = Timestamp::now();
        let request = PayoutRequest::new(
            party_id.clone(),
            amount,
            ledger.currency().clone(),
            idempotency_key,
            now,
        )?;

        let balance = ledger.balance_at(&party_id, now).await?;
        if balance.available < amount {
            warn!(available = %balance.available, "Payout rejected at pre-check");
            return Err(ApplicationError::InsufficientBalance {
                party_id,
                available: balance.available,
                requested: amount,
            });
        }

        let execution = self.execution.clone();
        tokio::spawn(execution.run(request, now).in_current_span())
            .await
            .map_err(|e| ApplicationError::integrity(format!("payout task ended abnormally: {e}")))?
    }

    /// Gets a payout request.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::NotFound` if the request does not exist.
    pub async fn get_payout(&self, id: PayoutId) -> ApplicationResult<PayoutRequest> {
        self.execution
            .payouts
            .get(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("PayoutRequest", id.to_string()))
    }

    /// Lists a party's payout requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_payouts(&self, party_id: &PartyId) -> ApplicationResult<Vec<PayoutRequest>> {
        Ok(self.execution.payouts.find_by_party(party_id).await?)
    }
}

impl Execution {
    async fn run(self, mut request: PayoutRequest, now: Timestamp) -> ApplicationResult<PayoutRequest> {
        match self.payouts.insert_if_absent(&request).await? {
            PayoutInsert::Inserted(_) => {}
            PayoutInsert::Existing(existing) => {
                info!(payout_id = %existing.id(), "Concurrent request with same key");
                return Ok(existing);
            }
        }

        let debit = Transaction::payout(
            request.party_id().clone(),
            request.id(),
            request.amount(),
            request.currency().clone(),
            now,
        )?;
        let debit_id = debit.id();
        if let Err(e) = self.ledger.append_debit(debit).await {
            let reason = if e.is_insufficient_balance() {
                "insufficient balance".to_string()
            } else {
                e.to_string()
            };
            self.fail_request(&mut request, reason, None).await?;
            return Err(e.into());
        }

        request.start_processing(debit_id, Timestamp::now())?;
        self.payouts.update(&request).await?;

        let submission = PayoutSubmission::from(&request);
        match tokio::time::timeout(self.processor_timeout, self.processor.submit(&submission)).await {
            Ok(Ok(outcome)) if outcome.is_success() => {
                self.settle(&mut request, debit_id, outcome).await?;
            }
            Ok(Ok(outcome)) => {
                let reason = outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| "declined by processor".to_string());
                self.release(&mut request, debit_id, reason, outcome.provider_reference)
                    .await?;
            }
            Ok(Err(e)) => {
                warn!(processor = self.processor.name(), error = %e, "Processor call failed");
                self.release(&mut request, debit_id, e.to_string(), None).await?;
            }
            Err(_) => {
                let reason = format!(
                    "processor timed out after {}ms",
                    self.processor_timeout.as_millis()
                );
                warn!(processor = self.processor.name(), "{reason}");
                self.release(&mut request, debit_id, reason, None).await?;
            }
        }

        Ok(request)
    }

    async fn settle(
        &self,
        request: &mut PayoutRequest,
        debit_id: TransactionId,
        outcome: ProcessorOutcome,
    ) -> ApplicationResult<()> {
        let reference = outcome
            .provider_reference
            .unwrap_or_else(|| request.id().to_string());
        self.ledger
            .complete_debit(request.party_id(), debit_id, Some(reference.clone()))
            .await?;
        request.complete(reference.clone(), Timestamp::now())?;
        self.payouts.update(request).await?;

        info!(payout_id = %request.id(), provider_reference = %reference, "Payout completed");
        self.notifier.publish(PayoutCompleted::new(
            request.party_id().clone(),
            request.id(),
            request.amount(),
            request.currency().clone(),
            reference,
        ));
        Ok(())
    }

    async fn release(
        &self,
        request: &mut PayoutRequest,
        debit_id: TransactionId,
        reason: String,
        provider_reference: Option<String>,
    ) -> ApplicationResult<()> {
        match self
            .ledger
            .fail_debit(request.party_id(), debit_id, provider_reference.clone())
            .await
        {
            Ok(_) => {}
            Err(LedgerError::UnknownTransaction(id)) => {
                return Err(ApplicationError::integrity(format!(
                    "payout {} lost its debit {id}",
                    request.id()
                )));
            }
            Err(e) => return Err(e.into()),
        }
        self.fail_request(request, reason, provider_reference).await
    }

    async fn fail_request(
        &self,
        request: &mut PayoutRequest,
        reason: String,
        provider_reference: Option<String>,
    ) -> ApplicationResult<()> {
        request.fail(reason.clone(), provider_reference, Timestamp::now())?;
        self.payouts.update(request).await?;

        info!(payout_id = %request.id(), reason = %reason, "Payout failed");
        self.notifier.publish(PayoutFailed::new(
            request.party_id().clone(),
            request.id(),
            request.amount(),
            reason,
        ));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{Fixture, amount};
    use crate::domain::entities::sale::SaleGroup;
    use crate::domain::value_objects::{
        Currency, PartyKind, PayoutStatus, TransactionStatus, TransactionType,
    };
    use crate::infrastructure::persistence::TransactionFilter;
    use crate::infrastructure::processor::{ProcessorError, SimulatedBehavior, SimulatedPaymentProcessor};

    /// Credits `value` to `party` as an already-matured sale.
    async fn fund(fx: &Fixture, party: &PartyId, value: &str) {
        let earlier = Timestamp::now().sub_days(10);
        let sale = Transaction::sale(
            TransactionId::new_v4(),
            party.clone(),
            amount(value),
            Currency::usd(),
            earlier,
            earlier,
        )
        .unwrap();
        fx.ledger
            .append_sale(SaleGroup::new(sale, Vec::new(), Vec::new()).unwrap())
            .await
            .unwrap();
    }

    fn workflow(fx: &Fixture, processor: Arc<SimulatedPaymentProcessor>) -> PayoutWorkflow {
        PayoutWorkflow::new(
            fx.ledger(),
            fx.payouts(),
            fx.parties(),
            processor,
            fx.notifier.clone(),
        )
    }

    #[tokio::test]
    async fn successful_payout_debits_balance() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::succeeding());
        let wf = workflow(&fx, Arc::clone(&processor));

        let request = wf
            .request_payout(party.clone(), amount("200.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap();

        assert_eq!(request.status(), PayoutStatus::Completed);
        assert_eq!(request.provider_reference(), Some("sim-000000"));
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("300.00"));

        let debit = fx.ledger.get(request.transaction_id().unwrap()).await.unwrap().unwrap();
        assert_eq!(debit.kind(), TransactionType::Payout);
        assert_eq!(debit.status(), TransactionStatus::Completed);
        assert_eq!(fx.events(1).await, vec!["PayoutCompleted"]);
    }

    #[tokio::test]
    async fn overdraft_is_rejected_without_side_effects() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::succeeding());
        let wf = workflow(&fx, Arc::clone(&processor));

        let err = wf
            .request_payout(party.clone(), amount("600.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap_err();

        assert!(err.is_insufficient_balance());
        assert_eq!(processor.call_count(), 0);
        assert!(fx.payouts.is_empty());
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("500.00"));
    }

    #[tokio::test]
    async fn idempotency_key_replays_without_second_call() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::succeeding());
        let wf = workflow(&fx, Arc::clone(&processor));

        let first = wf
            .request_payout(party.clone(), amount("200.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap();
        let second = wf
            .request_payout(party.clone(), amount("200.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(processor.call_count(), 1);
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("300.00"));
    }

    #[tokio::test]
    async fn decline_releases_funds() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::new(SimulatedBehavior::Decline(
            "account closed".to_string(),
        )));
        let wf = workflow(&fx, processor);

        let request = wf
            .request_payout(party.clone(), amount("200.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap();

        assert_eq!(request.status(), PayoutStatus::Failed);
        assert_eq!(request.failure_reason(), Some("account closed"));
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("500.00"));
        assert_eq!(fx.events(1).await, vec!["PayoutFailed"]);
    }

    #[tokio::test]
    async fn processor_error_fails_request() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::new(SimulatedBehavior::Fail(
            ProcessorError::connection("refused"),
        )));
        let wf = workflow(&fx, processor);

        let request = wf
            .request_payout(party.clone(), amount("100.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap();

        assert_eq!(request.status(), PayoutStatus::Failed);
        let failed = fx
            .ledger
            .query(
                &TransactionFilter {
                    kind: Some(TransactionType::Payout),
                    status: Some(TransactionStatus::Failed),
                    ..TransactionFilter::default()
                },
                0,
                10,
            )
            .await
            .unwrap();
        assert_eq!(failed.total, 1);
    }

    #[tokio::test]
    async fn timeout_fails_request_and_releases_funds() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::new(SimulatedBehavior::Delay(
            Duration::from_secs(5),
        )));
        let wf = workflow(&fx, processor).with_processor_timeout(Duration::from_millis(20));

        let request = wf
            .request_payout(party.clone(), amount("100.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap();

        assert_eq!(request.status(), PayoutStatus::Failed);
        assert!(request.failure_reason().unwrap().contains("timed out"));
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("500.00"));
        assert_eq!(wf.get_payout(request.id()).await.unwrap(), request);
    }

    #[tokio::test]
    async fn cancelled_caller_still_releases_after_timeout() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let processor = Arc::new(SimulatedPaymentProcessor::new(SimulatedBehavior::Delay(
            Duration::from_secs(5),
        )));
        let wf = Arc::new(workflow(&fx, processor).with_processor_timeout(Duration::from_millis(100)));

        let caller = {
            let wf = Arc::clone(&wf);
            let party = party.clone();
            tokio::spawn(async move {
                wf.request_payout(party, amount("500.00"), IdempotencyKey::new("k1"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        let mut requests = Vec::new();
        for _ in 0..100 {
            requests = wf.list_payouts(&party).await.unwrap();
            if requests.first().is_some_and(|r| r.status() == PayoutStatus::Failed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status(), PayoutStatus::Failed);
        assert!(requests[0].failure_reason().unwrap().contains("timed out"));
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("500.00"));
    }

    #[tokio::test]
    async fn unapproved_and_unknown_parties_are_rejected() {
        let fx = Fixture::new().await;
        let pending = fx.pending("startup", PartyKind::Seller).await;
        let wf = workflow(&fx, Arc::new(SimulatedPaymentProcessor::succeeding()));

        let err = wf
            .request_payout(pending, amount("1.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap_err();
        assert!(err.is_not_approved());

        let err = wf
            .request_payout(PartyId::new("ghost"), amount("1.00"), IdempotencyKey::new("k1"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn zero_amount_is_invalid() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        let wf = workflow(&fx, Arc::new(SimulatedPaymentProcessor::succeeding()));

        let err = wf
            .request_payout(party, Amount::ZERO, IdempotencyKey::new("k1"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn concurrent_payouts_never_overdraw() {
        let fx = Fixture::new().await;
        let party = fx.approved("startup", PartyKind::Seller).await;
        fund(&fx, &party, "500.00").await;
        let wf = Arc::new(workflow(&fx, Arc::new(SimulatedPaymentProcessor::succeeding())));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let wf = Arc::clone(&wf);
                let party = party.clone();
                tokio::spawn(async move {
                    wf.request_payout(party, amount("100.00"), IdempotencyKey::new(format!("k{i}")))
                        .await
                })
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            if let Ok(request) = handle.await.unwrap() {
                if request.status() == PayoutStatus::Completed {
                    completed += 1;
                }
            }
        }

        assert_eq!(completed, 5);
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, Amount::ZERO);
        assert!(wf.list_payouts(&party).await.unwrap().len() >= 5);
    }
}
