//! # Domain Services
//!
//! Domain services encapsulating business logic that doesn't naturally
//! belong to a single entity or value object.
//!
//! ## Services
//!
//! - [`commission_resolver::CommissionResolver`]: Rate precedence and sale splitting
//! - [`balance`]: Balance derivation from the transaction log

pub mod balance;
pub mod commission_resolver;

pub use balance::{Balance, BalanceAccumulator, fold_balance, replay_balance};
pub use commission_resolver::{
    ApprovalCheck, CommissionResolver, PartyShare, ResolvedRate, ResolverConfig, SplitResult,
};
