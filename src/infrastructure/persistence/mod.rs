//! # Persistence Layer
//!
//! Storage ports and their in-memory adapters.
//!
//! ## Ports
//!
//! - [`LedgerStore`]: Append-only transaction log with derived balances
//! - [`PartyRepository`]: Parties and moderation state
//! - [`PayoutRepository`]: Payout requests
//!
//! ## Implementations
//!
//! - `in_memory`: Lock-based in-process adapters

pub mod in_memory;
pub mod traits;

pub use traits::{
    DecisionOutcome, LedgerError, LedgerResult, LedgerStore, Page, PartyRepository, PayoutInsert,
    PayoutRepository, RepositoryError, RepositoryResult, TransactionFilter,
};
