//! # Application Layer
//!
//! Use-case services and the errors they report.

pub mod error;
pub mod services;

pub use error::{ApplicationError, ApplicationResult, InfrastructureError};
