//! # Payout Reconciliation
//!
//! Handles processor callbacks that arrive after the workflow already gave
//! up on a payout, typically after a timeout.
//!
//! | Request   | Callback  | Action                                         |
//! |-----------|-----------|------------------------------------------------|
//! | Failed    | Succeeded | corrective debit if funds allow, else manual review |
//! | Failed    | Declined  | none                                           |
//! | Completed | Succeeded | none                                           |
//! | Completed | Declined  | conflict                                       |
//! | Pending / Processing | any | conflict, the workflow still owns it    |
//!
//! Callbacks for the same payout are applied one at a time against freshly
//! read state, so repeated or concurrent deliveries book at most one
//! corrective debit and later ones return the request unchanged. The ledger
//! also refuses a second live debit for one payout request.

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::entities::payout_request::{LateSettlement, PayoutRequest};
use crate::domain::entities::transaction::Transaction;
use crate::domain::events::PayoutReconciled;
use crate::domain::value_objects::{PayoutId, PayoutStatus, Timestamp};
use crate::infrastructure::notifications::Notifier;
use crate::infrastructure::persistence::{LedgerError, LedgerStore, PayoutRepository};
use crate::infrastructure::processor::{ProcessorCallback, ProcessorStatus};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Applies late processor results to the ledger.
#[derive(Debug)]
pub struct Reconciler {
    ledger: Arc<dyn LedgerStore>,
    payouts: Arc<dyn PayoutRepository>,
    notifier: Notifier,
    in_progress: DashMap<PayoutId, Arc<Mutex<()>>>,
}

impl Reconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        payouts: Arc<dyn PayoutRepository>,
        notifier: Notifier,
    ) -> Self {
        Self {
            ledger,
            payouts,
            notifier,
            in_progress: DashMap::new(),
        }
    }

    /// Applies one callback and returns the request as it now stands.
    ///
    /// # Errors
    ///
    /// - `ApplicationError::NotFound` if the payout does not exist
    /// - `ApplicationError::Conflict` if the callback contradicts a
    ///   completed payout or the payout is still in flight
    #[instrument(skip(self, callback), fields(payout_id = %callback.payout_id, status = %callback.status))]
    pub async fn handle_callback(&self, callback: ProcessorCallback) -> ApplicationResult<PayoutRequest> {
        let payout_id = callback.payout_id;
        let slot = Arc::clone(self.in_progress.entry(payout_id).or_default().value());
        let result = {
            let _guard = slot.lock().await;
            self.apply(callback).await
        };
        drop(slot);
        self.in_progress
            .remove_if(&payout_id, |_, slot| Arc::strong_count(slot) == 1);
        result
    }

    async fn apply(&self, callback: ProcessorCallback) -> ApplicationResult<PayoutRequest> {
        let mut request = self
            .payouts
            .get(callback.payout_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("PayoutRequest", callback.payout_id.to_string()))?;

        match (request.status(), callback.status) {
            (PayoutStatus::Failed, ProcessorStatus::Succeeded) if request.late_settlement().is_none() => {}
            (PayoutStatus::Failed, _) | (PayoutStatus::Completed, ProcessorStatus::Succeeded) => {
                info!(request_status = %request.status(), "Callback matches recorded state");
                return Ok(request);
            }
            (PayoutStatus::Completed, ProcessorStatus::Declined) => {
                warn!("Processor declined a completed payout");
                return Err(ApplicationError::conflict(format!(
                    "payout {} is completed but the processor reports it declined",
                    request.id()
                )));
            }
            (status, _) => {
                return Err(ApplicationError::conflict(format!(
                    "payout {} is still {status}",
                    request.id()
                )));
            }
        }

        let settlement = self.book_correction(&request, callback.provider_reference).await?;
        request.record_late_settlement(settlement.clone(), Timestamp::now())?;
        self.payouts.update(&request).await?;

        self.notifier.publish(PayoutReconciled::new(
            request.party_id().clone(),
            request.id(),
            settlement,
        ));
        Ok(request)
    }

    async fn book_correction(
        &self,
        request: &PayoutRequest,
        provider_reference: String,
    ) -> ApplicationResult<LateSettlement> {
        let now = Timestamp::now();
        let debit = Transaction::payout(
            request.party_id().clone(),
            request.id(),
            request.amount(),
            request.currency().clone(),
            now,
        )?;
        let debit_id = debit.id();

        match self.ledger.append_debit(debit).await {
            Ok(_) => {
                self.ledger
                    .complete_debit(request.party_id(), debit_id, Some(provider_reference.clone()))
                    .await?;
                info!(transaction_id = %debit_id, "Corrective debit booked for late success");
                Ok(LateSettlement::Corrected {
                    transaction_id: debit_id,
                    provider_reference,
                    at: now,
                })
            }
            Err(LedgerError::PayoutAlreadyDebited(_)) => Err(ApplicationError::conflict(format!(
                "payout {} already has a live debit",
                request.id()
            ))),
            Err(LedgerError::InsufficientBalance { available, .. }) => {
                warn!(
                    available = %available,
                    requested = %request.amount(),
                    "Late success exceeds available balance, manual review required"
                );
                Ok(LateSettlement::ManualReview {
                    provider_reference,
                    at: now,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::application::services::payout_workflow::PayoutWorkflow;
    use crate::application::services::test_support::{Fixture, amount};
    use crate::domain::entities::sale::SaleGroup;
    use crate::domain::value_objects::{
        Currency, IdempotencyKey, PartyId, PartyKind, TransactionId, TransactionStatus, TransactionType,
    };
    use crate::infrastructure::processor::{ProcessorError, SimulatedBehavior, SimulatedPaymentProcessor};

    async fn funded(fx: &Fixture, value: &str) -> PartyId {
        let party = fx.approved("startup", PartyKind::Seller).await;
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
        party
    }

    async fn failed_payout(fx: &Fixture, party: &PartyId, value: &str) -> PayoutRequest {
        let processor = Arc::new(SimulatedPaymentProcessor::new(SimulatedBehavior::Fail(
            ProcessorError::timeout("no answer", Some(10)),
        )));
        PayoutWorkflow::new(fx.ledger(), fx.payouts(), fx.parties(), processor, fx.notifier.clone())
            .request_payout(party.clone(), amount(value), IdempotencyKey::new("k1"))
            .await
            .unwrap()
    }

    fn success(request: &PayoutRequest) -> ProcessorCallback {
        ProcessorCallback {
            payout_id: request.id(),
            status: ProcessorStatus::Succeeded,
            provider_reference: "psp-77".to_string(),
        }
    }

    #[tokio::test]
    async fn late_success_books_corrective_debit() {
        let fx = Fixture::new().await;
        let party = funded(&fx, "500.00").await;
        let failed = failed_payout(&fx, &party, "200.00").await;
        assert_eq!(failed.status(), PayoutStatus::Failed);

        let reconciler = Reconciler::new(fx.ledger(), fx.payouts(), fx.notifier.clone());
        let request = reconciler.handle_callback(success(&failed)).await.unwrap();

        match request.late_settlement() {
            Some(LateSettlement::Corrected { provider_reference, .. }) => {
                assert_eq!(provider_reference, "psp-77");
            }
            other => panic!("unexpected settlement {other:?}"),
        }
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("300.00"));

        let again = reconciler.handle_callback(success(&failed)).await.unwrap();
        assert_eq!(again, request);
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("300.00"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_late_successes_book_one_debit() {
        let fx = Fixture::new().await;
        let party = funded(&fx, "500.00").await;
        let failed = failed_payout(&fx, &party, "200.00").await;
        let reconciler = Arc::new(Reconciler::new(fx.ledger(), fx.payouts(), fx.notifier.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reconciler = Arc::clone(&reconciler);
                let callback = success(&failed);
                tokio::spawn(async move { reconciler.handle_callback(callback).await })
            })
            .collect();
        for handle in handles {
            let request = handle.await.unwrap().unwrap();
            assert!(matches!(
                request.late_settlement(),
                Some(LateSettlement::Corrected { .. })
            ));
        }

        let live_debits = fx
            .ledger
            .log()
            .await
            .unwrap()
            .into_iter()
            .filter(|tx| tx.kind() == TransactionType::Payout)
            .filter(|tx| tx.payout_reference() == Some(failed.id()))
            .filter(|tx| tx.status() == TransactionStatus::Completed)
            .count();
        assert_eq!(live_debits, 1);
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("300.00"));
        assert!(reconciler.in_progress.is_empty());
    }

    #[tokio::test]
    async fn late_success_without_funds_needs_review() {
        let fx = Fixture::new().await;
        let party = funded(&fx, "500.00").await;
        let failed = failed_payout(&fx, &party, "200.00").await;

        let drain = Arc::new(SimulatedPaymentProcessor::succeeding());
        PayoutWorkflow::new(fx.ledger(), fx.payouts(), fx.parties(), drain, fx.notifier.clone())
            .request_payout(party.clone(), amount("400.00"), IdempotencyKey::new("k2"))
            .await
            .unwrap();

        let reconciler = Reconciler::new(fx.ledger(), fx.payouts(), fx.notifier.clone());
        let request = reconciler.handle_callback(success(&failed)).await.unwrap();

        assert!(matches!(
            request.late_settlement(),
            Some(LateSettlement::ManualReview { .. })
        ));
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("100.00"));
    }

    #[tokio::test]
    async fn declined_callback_for_failed_payout_is_noop() {
        let fx = Fixture::new().await;
        let party = funded(&fx, "500.00").await;
        let failed = failed_payout(&fx, &party, "200.00").await;

        let reconciler = Reconciler::new(fx.ledger(), fx.payouts(), fx.notifier.clone());
        let mut callback = success(&failed);
        callback.status = ProcessorStatus::Declined;
        let request = reconciler.handle_callback(callback).await.unwrap();

        assert!(request.late_settlement().is_none());
        assert_eq!(fx.ledger.balance(&party).await.unwrap().available, amount("500.00"));
    }

    #[tokio::test]
    async fn unknown_payout_is_not_found() {
        let fx = Fixture::new().await;
        let reconciler = Reconciler::new(fx.ledger(), fx.payouts(), fx.notifier.clone());
        let err = reconciler
            .handle_callback(ProcessorCallback {
                payout_id: crate::domain::value_objects::PayoutId::new_v4(),
                status: ProcessorStatus::Succeeded,
                provider_reference: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
