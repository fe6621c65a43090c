//! # API Layer
//!
//! External interfaces of the ledger service.

pub mod rest;
