//! # Settlement Ledger
//!
//! Commission and settlement ledger for multi-party marketplaces.
//!
//! Every sale is split between the seller, the support structures that
//! referred it and the platform operator. Credits sit in a hold period
//! before they become available, and available funds leave the ledger
//! through idempotent payout requests. Parties take part only once a
//! moderator has approved them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ api          REST endpoints (axum)           │
//! ├──────────────────────────────────────────────┤
//! │ application  settlement, payouts, approvals, │
//! │              reconciliation, hold sweeper    │
//! ├──────────────────────────────────────────────┤
//! │ domain       entities, value objects, rate   │
//! │              resolution, balance folding     │
//! ├──────────────────────────────────────────────┤
//! │ infrastructure  storage, payment processor,  │
//! │                 notifications, config        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use settlement_ledger::domain::value_objects::{Amount, BasisPoints};
//!
//! let sale: Amount = "2000.00".parse().unwrap();
//! let share = sale.share(BasisPoints::new(800).unwrap()).unwrap();
//! assert_eq!(share, Amount::from_minor(16_000));
//! ```

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
