//! # Domain Entities
//!
//! Aggregate roots and entities of the settlement ledger.
//!
//! ## Aggregates
//!
//! - [`Party`]: Seller, support structure or platform with its moderation state
//! - [`PayoutRequest`]: Withdrawal request with state machine
//! - [`RateTable`]: Commission tiers, category overrides and custom rates
//!
//! ## Entities
//!
//! - [`Transaction`]: Append-only ledger entry
//! - [`SaleEvent`]: Completed sale awaiting settlement
//! - [`SaleGroup`]: Transactions committed together for one sale

pub mod party;
pub mod payout_request;
pub mod rate_table;
pub mod sale;
pub mod transaction;

pub use party::Party;
pub use payout_request::{LateSettlement, PayoutRequest};
pub use rate_table::{CategoryRate, CommissionTier, CustomRate, RatePair, RateTable, TierTable};
pub use sale::{Referral, ReferralSplit, SaleEvent, SaleGroup};
pub use transaction::{Transaction, TransactionReference};
