//! # In-Memory Adapters
//!
//! In-memory implementations of the persistence ports. They back the
//! service binary and the test suite.
//!
//! ## Available Adapters
//!
//! - [`InMemoryLedgerStore`]: Transaction log with per-party locking
//! - [`InMemoryPartyRepository`]: Parties and moderation state
//! - [`InMemoryPayoutRepository`]: Payout requests keyed by idempotency key

pub mod ledger_store;
pub mod party_repository;
pub mod payout_repository;

pub use ledger_store::InMemoryLedgerStore;
pub use party_repository::InMemoryPartyRepository;
pub use payout_repository::InMemoryPayoutRepository;
