//! # Notification Port
//!
//! Dispatchers receive [`LedgerEvent`]s after the state change they describe
//! has been committed. Delivery is best effort: a failing dispatcher never
//! rolls back or blocks ledger work.

use crate::domain::events::LedgerEvent;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Error type for notification delivery.
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    /// The receiving endpoint could not be reached.
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    /// The receiving endpoint answered with a non-success status.
    #[error("notification rejected with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// The event could not be encoded.
    #[error("notification encoding failed: {0}")]
    Encoding(String),
}

impl NotificationError {
    /// Creates a delivery error.
    #[must_use]
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }
}

/// Result type for notification delivery.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Port for notification dispatchers.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + fmt::Debug {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns a `NotificationError` if delivery failed.
    async fn dispatch(&self, event: &LedgerEvent) -> NotificationResult<()>;
}
