//! # Simulated Payment Processor
//!
//! In-process [`PaymentProcessor`] with scripted behavior. Used when no
//! processor URL is configured and throughout the test suite.

use crate::infrastructure::processor::error::{ProcessorError, ProcessorResult};
use crate::infrastructure::processor::traits::{
    PaymentProcessor, PayoutSubmission, ProcessorOutcome,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Scripted behavior of a [`SimulatedPaymentProcessor`].
#[derive(Debug, Clone)]
pub enum SimulatedBehavior {
    /// Every payout succeeds.
    Succeed,
    /// Every payout is declined with the given reason.
    Decline(String),
    /// Every call fails with the given error.
    Fail(ProcessorError),
    /// Every payout succeeds after the given delay.
    Delay(Duration),
}

/// In-process payment processor.
#[derive(Debug)]
pub struct SimulatedPaymentProcessor {
    behavior: Mutex<SimulatedBehavior>,
    submissions: Mutex<Vec<PayoutSubmission>>,
    counter: AtomicU64,
}

impl SimulatedPaymentProcessor {
    /// Creates a processor with the given behavior.
    #[must_use]
    pub fn new(behavior: SimulatedBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            submissions: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// A processor that accepts every payout.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(SimulatedBehavior::Succeed)
    }

    /// Changes the behavior for subsequent calls.
    pub fn set_behavior(&self, behavior: SimulatedBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Returns every submission received so far.
    #[must_use]
    pub fn submissions(&self) -> Vec<PayoutSubmission> {
        self.submissions.lock().clone()
    }

    /// Returns the number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.submissions.lock().len()
    }

    fn next_reference(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("sim-{n:06}")
    }
}

impl Default for SimulatedPaymentProcessor {
    fn default() -> Self {
        Self::succeeding()
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn submit(&self, submission: &PayoutSubmission) -> ProcessorResult<ProcessorOutcome> {
        self.submissions.lock().push(submission.clone());
        let behavior = self.behavior.lock().clone();
        match behavior {
            SimulatedBehavior::Succeed => Ok(ProcessorOutcome::succeeded(self.next_reference())),
            SimulatedBehavior::Decline(reason) => {
                Ok(ProcessorOutcome::declined(reason, Some(self.next_reference())))
            }
            SimulatedBehavior::Fail(error) => Err(error),
            SimulatedBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ProcessorOutcome::succeeded(self.next_reference()))
            }
        }
    }
}
