//! # Infrastructure Layer
//!
//! Adapters behind the ports the application layer depends on.
//!
//! - [`persistence`]: Ledger store and repositories
//! - [`processor`]: Payment processor clients
//! - [`notifications`]: Event dispatchers
//! - [`config`]: Layered service configuration

pub mod config;
pub mod notifications;
pub mod persistence;
pub mod processor;
