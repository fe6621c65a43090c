//! # Domain Layer
//!
//! Pure business types and rules of the settlement ledger: value objects,
//! entities, events and domain services. Nothing here performs I/O.

pub mod entities;
pub mod errors;
pub mod events;
pub mod services;
pub mod value_objects;

pub use errors::{DomainError, DomainResult};
