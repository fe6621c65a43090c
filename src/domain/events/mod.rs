//! # Domain Events
//!
//! Events emitted after ledger state changes, for notification and audit.
//!
//! ## Sale Events
//!
//! - [`SaleSettled`]: Sale and commissions committed
//!
//! ## Approval Events
//!
//! - [`PartySubmitted`]: Party entered the moderation queue
//! - [`PartyDecided`]: Party approved or rejected
//!
//! ## Payout Events
//!
//! - [`PayoutCompleted`]: Processor confirmed the transfer
//! - [`PayoutFailed`]: Payout failed
//! - [`PayoutReconciled`]: Late processor success reconciled

pub mod domain_event;
pub mod ledger_events;

pub use domain_event::{DomainEvent, EventMetadata, EventType};
pub use ledger_events::{
    CommissionCredit, LedgerEvent, PartyDecided, PartySubmitted, PayoutCompleted, PayoutFailed,
    PayoutReconciled, SaleSettled,
};
