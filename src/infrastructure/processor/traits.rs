//! # Payment Processor Port
//!
//! The third-party processor that actually moves money. The ledger hands it
//! one [`PayoutSubmission`] per accepted payout request and records the
//! returned provider reference on the payout transaction.

use crate::domain::entities::payout_request::PayoutRequest;
use crate::domain::value_objects::{Amount, Currency, IdempotencyKey, PartyId, PayoutId};
use crate::infrastructure::processor::error::ProcessorResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A payout handed to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutSubmission {
    /// Ledger-side payout id, echoed back in callbacks.
    pub payout_id: PayoutId,
    /// Beneficiary.
    pub party_id: PartyId,
    /// Amount to send.
    pub amount: Amount,
    /// Currency.
    pub currency: Currency,
    /// Forwarded so the processor can deduplicate as well.
    pub idempotency_key: IdempotencyKey,
}

impl From<&PayoutRequest> for PayoutSubmission {
    fn from(request: &PayoutRequest) -> Self {
        Self {
            payout_id: request.id(),
            party_id: request.party_id().clone(),
            amount: request.amount(),
            currency: request.currency().clone(),
            idempotency_key: request.idempotency_key().clone(),
        }
    }
}

/// Final answer of the processor for one payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessorStatus {
    /// Funds were sent.
    Succeeded,
    /// The processor refused the payout.
    Declined,
}

impl fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Declined => write!(f, "DECLINED"),
        }
    }
}

/// Result of a processor call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorOutcome {
    /// Final status.
    pub status: ProcessorStatus,
    /// Processor-side reference.
    #[serde(default)]
    pub provider_reference: Option<String>,
    /// Decline reason, if any.
    #[serde(default)]
    pub message: Option<String>,
}

impl ProcessorOutcome {
    /// A successful payout.
    #[must_use]
    pub fn succeeded(provider_reference: impl Into<String>) -> Self {
        Self {
            status: ProcessorStatus::Succeeded,
            provider_reference: Some(provider_reference.into()),
            message: None,
        }
    }

    /// A declined payout.
    #[must_use]
    pub fn declined(message: impl Into<String>, provider_reference: Option<String>) -> Self {
        Self {
            status: ProcessorStatus::Declined,
            provider_reference,
            message: Some(message.into()),
        }
    }

    /// Returns true if funds were sent.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ProcessorStatus::Succeeded
    }
}

/// Asynchronous status report sent by the processor after the original
/// call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorCallback {
    /// The payout the report is about.
    pub payout_id: PayoutId,
    /// Final status at the processor.
    pub status: ProcessorStatus,
    /// Processor reference for the transfer.
    pub provider_reference: String,
}

/// Port for the payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync + fmt::Debug {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// Submits a payout and waits for the processor's answer.
    ///
    /// # Errors
    ///
    /// Returns a `ProcessorError` if no usable answer was received.
    async fn submit(&self, submission: &PayoutSubmission) -> ProcessorResult<ProcessorOutcome>;
}
