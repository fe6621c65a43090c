//! # Processor Errors
//!
//! Error types for payment processor calls.
//!
//! A declined payout is not an error: it comes back as a
//! [`ProcessorOutcome`](super::traits::ProcessorOutcome). These errors cover
//! calls whose result is unknown or unusable.
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::infrastructure::processor::error::ProcessorError;
//!
//! let error = ProcessorError::timeout("no answer after 5000ms", Some(5000));
//! assert!(error.is_timeout());
//! ```

use thiserror::Error;

/// Error type for payment processor operations.
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    /// The processor did not answer in time; the payout may still settle.
    #[error("processor timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
        /// Timeout in milliseconds.
        timeout_ms: Option<u64>,
    },

    /// The processor could not be reached.
    #[error("processor connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The processor refused the request as malformed.
    #[error("processor invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// The response could not be understood.
    #[error("processor protocol error: {message}")]
    Protocol {
        /// Error message.
        message: String,
    },

    /// Client-side failure.
    #[error("processor internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl ProcessorError {
    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>, timeout_ms: Option<u64>) -> Self {
        Self::Timeout {
            message: message.into(),
            timeout_ms,
        }
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the call timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the payout may have reached the processor, so a late
    /// callback is possible.
    #[must_use]
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Protocol { .. })
    }
}

/// Result type for processor operations.
pub type ProcessorResult<T> = Result<T, ProcessorError>;
