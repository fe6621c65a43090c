//! # Application Errors
//!
//! Failures of ledger use cases, classified by how a caller should react:
//! fix the request, retry, or escalate.
//!
//! # Error Hierarchy
//!
//! ```text
//! ApplicationError
//! ├── Domain(DomainError)                 - Business rule violations
//! ├── Infrastructure(InfrastructureError) - Processor and storage failures
//! ├── Validation(String)                  - Malformed input, no state change
//! ├── NotFound                            - Unknown party, payout or transaction
//! ├── NotApproved(PartyId)                - Party may not transact
//! ├── Conflict(String)                    - Concurrent or duplicate write
//! ├── AlreadyDecided(Party)               - Moderation already concluded
//! ├── InsufficientBalance                 - Payout pre-check failed
//! └── Integrity(String)                   - Ledger or rate table inconsistent
//! ```
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::application::error::{ApplicationError, InfrastructureError};
//! use settlement_ledger::infrastructure::processor::ProcessorError;
//!
//! let err = ApplicationError::validation("amount must be positive");
//! assert!(err.is_validation());
//!
//! let err = ApplicationError::not_found("Party", "startup-42");
//! assert!(err.is_not_found());
//!
//! let infra_err = InfrastructureError::from(ProcessorError::connection("refused"));
//! let app_err: ApplicationError = infra_err.into();
//! assert!(app_err.is_processor());
//! ```

use crate::domain::entities::party::Party;
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{Amount, PartyId};
use crate::infrastructure::persistence::{LedgerError, RepositoryError};
use crate::infrastructure::processor::ProcessorError;
use thiserror::Error;

/// Failure of a system the ledger depends on.
#[derive(Debug, Error)]
pub enum InfrastructureError {
    /// The payment processor could not be used.
    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// Party or payout storage failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl InfrastructureError {
    /// Returns true if the error came from the payment processor.
    #[must_use]
    pub fn is_processor(&self) -> bool {
        matches!(self, Self::Processor(_))
    }
}

/// Application layer error.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain error from business logic.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// Infrastructure error from external systems.
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] InfrastructureError),

    /// Request validation failed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("not found: {resource_type} with id {id}")]
    NotFound {
        /// Type of resource.
        resource_type: String,
        /// Resource identifier.
        id: String,
    },

    /// The party is not approved to transact.
    #[error("party {0} is not approved")]
    NotApproved(PartyId),

    /// A write lost a race or duplicated an existing record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The party was already approved or rejected. Carries its current state.
    #[error("party {} already decided: {}", .0.id(), .0.approval_status())]
    AlreadyDecided(Box<Party>),

    /// The payout exceeds the available balance.
    #[error("insufficient balance for {party_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The requesting party.
        party_id: PartyId,
        /// Available balance at check time.
        available: Amount,
        /// Requested amount.
        requested: Amount,
    },

    /// Stored data or configuration violates an invariant.
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl ApplicationError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates an already-decided error carrying the party's current state.
    #[must_use]
    pub fn already_decided(party: Party) -> Self {
        Self::AlreadyDecided(Box::new(party))
    }

    /// Creates an integrity error.
    #[must_use]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the request itself was malformed.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Domain(e) => e.is_validation(),
            _ => false,
        }
    }

    /// Returns true if a party is not approved.
    #[must_use]
    pub fn is_not_approved(&self) -> bool {
        matches!(
            self,
            Self::NotApproved(_) | Self::Domain(DomainError::NoApprovedParty(_))
        )
    }

    /// Returns true for conflicts, including already-decided moderation.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_)
                | Self::AlreadyDecided(_)
                | Self::Domain(DomainError::AlreadyDecided { .. })
                | Self::Domain(DomainError::InvalidStateTransition { .. })
        )
    }

    /// Returns true if a payout exceeded the available balance.
    #[must_use]
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, Self::InsufficientBalance { .. })
    }

    /// Returns true for integrity failures.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        match self {
            Self::Integrity(_) => true,
            Self::Domain(e) => e.is_integrity(),
            _ => false,
        }
    }

    /// Returns true for payment processor failures.
    #[must_use]
    pub fn is_processor(&self) -> bool {
        matches!(self, Self::Infrastructure(e) if e.is_processor())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity_type, id } => Self::not_found(entity_type, id),
            RepositoryError::Duplicate { .. } | RepositoryError::VersionConflict { .. } => {
                Self::Conflict(error.to_string())
            }
            other => Self::Infrastructure(InfrastructureError::Repository(other)),
        }
    }
}

impl From<LedgerError> for ApplicationError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::InsufficientBalance {
                party_id,
                available,
                requested,
            } => Self::InsufficientBalance {
                party_id,
                available,
                requested,
            },
            LedgerError::PartyNotApproved(party_id) => Self::NotApproved(party_id),
            LedgerError::DuplicateTransaction(_) | LedgerError::PayoutAlreadyDebited(_) => {
                Self::Conflict(error.to_string())
            }
            LedgerError::CurrencyMismatch { .. } => Self::Validation(error.to_string()),
            LedgerError::UnknownTransaction(id) => Self::not_found("Transaction", id.to_string()),
            LedgerError::Domain(e) => Self::Domain(e),
            LedgerError::Repository(e) => e.into(),
        }
    }
}

impl From<ProcessorError> for ApplicationError {
    fn from(error: ProcessorError) -> Self {
        Self::Infrastructure(InfrastructureError::Processor(error))
    }
}

/// Result type for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
