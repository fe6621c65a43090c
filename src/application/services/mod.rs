//! # Application Services
//!
//! Use cases that orchestrate domain logic and infrastructure.
//!
//! - [`SettlementService`]: Sale intake, rate previews and rate table writes
//! - [`PayoutWorkflow`]: Withdrawal requests against the payment processor
//! - [`ApprovalQueue`]: Party moderation
//! - [`Reconciler`]: Late processor callbacks
//! - [`HoldSweeper`]: Background release of matured credits

pub mod approval_queue;
pub mod hold_sweeper;
pub mod payout_workflow;
pub mod reconciliation;
pub mod settlement;

#[cfg(test)]
pub(crate) mod test_support;

pub use approval_queue::ApprovalQueue;
pub use hold_sweeper::{HoldSweeper, SweeperHandle};
pub use payout_workflow::{DEFAULT_PROCESSOR_TIMEOUT, PayoutWorkflow};
pub use reconciliation::Reconciler;
pub use settlement::{RatePreview, SaleReceipt, SettlementConfig, SettlementService};
