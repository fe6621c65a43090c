//! # Domain Errors
//!
//! Errors raised by value objects, entities and domain services when a
//! business rule is violated.

use crate::domain::value_objects::arithmetic::ArithmeticError;
use crate::domain::value_objects::enums::ApprovalStatus;
use crate::domain::value_objects::ids::PartyId;
use thiserror::Error;

/// Error type for domain rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Amount is negative, zero where positive is required, or too precise.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Currency code is not a three-letter ISO 4217 code.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// Basis points outside `0..=10_000`.
    #[error("invalid basis points: {0} (must be at most 10000)")]
    InvalidBasisPoints(u32),

    /// Generic validation failure.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A state machine rejected a transition.
    #[error("invalid {entity} state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Entity whose state machine rejected the transition.
        entity: &'static str,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// An approval decision targeted a party that is no longer pending.
    #[error("party {party_id} already decided: {status}")]
    AlreadyDecided {
        /// The party.
        party_id: PartyId,
        /// Its terminal status.
        status: ApprovalStatus,
    },

    /// A sale referenced a party that is not approved.
    #[error("party {0} is not approved")]
    NoApprovedParty(PartyId),

    /// Commission configuration is malformed (tier gaps, shares above 100%).
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Commission amounts would exceed the sale amount.
    #[error("commission total {commissions} exceeds sale amount {sale}")]
    CommissionExceedsSale {
        /// Sum of commission amounts.
        commissions: String,
        /// Sale amount.
        sale: String,
    },

    /// Arithmetic failure.
    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

impl DomainError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// Creates an integrity error.
    #[must_use]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Returns true if the error represents malformed input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidCurrency(_)
                | Self::InvalidBasisPoints(_)
                | Self::ValidationError(_)
        )
    }

    /// Returns true if the error is a configuration integrity failure.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::CommissionExceedsSale { .. })
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
