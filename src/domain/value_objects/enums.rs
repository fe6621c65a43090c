//! # Domain Enums
//!
//! Enumeration types for ledger concepts:
//!
//! - [`PartyKind`] - Seller, support structure or platform
//! - [`ApprovalStatus`] / [`Decision`] - Moderation lifecycle
//! - [`TransactionType`] / [`TransactionStatus`] - Ledger record classification
//! - [`PayoutStatus`] - Payout workflow states
//! - [`RateSource`] - Which rule produced a commission split
//!
//! Every status enum exposes `is_terminal` and `can_transition_to` so entities
//! enforce their state machines the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an enum from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseEnumError {
    /// The string did not match any variant.
    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
}

fn normalize(s: &str) -> String {
    s.trim().to_uppercase().replace('-', "_")
}

/// Role a party plays in settlement.
///
/// # Examples
///
/// ```
/// use settlement_ledger::domain::value_objects::enums::PartyKind;
///
/// assert!(PartyKind::Seller.requires_moderation());
/// assert!(!PartyKind::Platform.requires_moderation());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartyKind {
    /// A startup selling on the marketplace.
    Seller,
    /// An intermediary earning commission on referred sales.
    SupportStructure,
    /// The marketplace operator.
    Platform,
}

impl PartyKind {
    /// Returns true if parties of this kind go through the moderation queue.
    #[inline]
    #[must_use]
    pub const fn requires_moderation(self) -> bool {
        !matches!(self, Self::Platform)
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seller => write!(f, "SELLER"),
            Self::SupportStructure => write!(f, "SUPPORT_STRUCTURE"),
            Self::Platform => write!(f, "PLATFORM"),
        }
    }
}

impl FromStr for PartyKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "SELLER" | "STARTUP" => Ok(Self::Seller),
            "SUPPORT_STRUCTURE" | "SUPPORT" => Ok(Self::SupportStructure),
            "PLATFORM" => Ok(Self::Platform),
            _ => Err(ParseEnumError::InvalidValue("PartyKind", s.to_string())),
        }
    }
}

/// Moderation status of a party.
///
/// ```text
/// Pending → Approved
///    └────→ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// Awaiting a moderator decision.
    #[default]
    Pending,
    /// Admitted to the marketplace (terminal).
    Approved,
    /// Permanently excluded (terminal).
    Rejected,
}

impl ApprovalStatus {
    /// Returns true if no further transition is possible.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Returns true if this state can transition to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// A moderator's verdict on a pending party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Admit the party.
    Approve,
    /// Exclude the party.
    Reject,
}

impl Decision {
    /// The approval status this decision leads to.
    #[inline]
    #[must_use]
    pub const fn target_status(self) -> ApprovalStatus {
        match self {
            Self::Approve => ApprovalStatus::Approved,
            Self::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "APPROVE"),
            Self::Reject => write!(f, "REJECT"),
        }
    }
}

impl FromStr for Decision {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "APPROVE" | "APPROVED" => Ok(Self::Approve),
            "REJECT" | "REJECTED" => Ok(Self::Reject),
            _ => Err(ParseEnumError::InvalidValue("Decision", s.to_string())),
        }
    }
}

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Gross sale, owned by the seller.
    Sale,
    /// Commission earned by a support structure or the platform.
    Commission,
    /// Withdrawal of available balance.
    Payout,
}

impl TransactionType {
    /// Returns true for types that credit the owning party.
    #[inline]
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Sale | Self::Commission)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sale => write!(f, "SALE"),
            Self::Commission => write!(f, "COMMISSION"),
            Self::Payout => write!(f, "PAYOUT"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "SALE" => Ok(Self::Sale),
            "COMMISSION" => Ok(Self::Commission),
            "PAYOUT" => Ok(Self::Payout),
            _ => Err(ParseEnumError::InvalidValue("TransactionType", s.to_string())),
        }
    }
}

/// Status of a ledger transaction.
///
/// ```text
/// Pending → Completed
///    └────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Inside the hold window, or a payout awaiting the processor.
    #[default]
    Pending,
    /// Settled (terminal).
    Completed,
    /// Failed (terminal, never recovers).
    Failed,
}

impl TransactionStatus {
    /// Returns true if no further transition is possible.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if this state can transition to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ParseEnumError::InvalidValue(
                "TransactionStatus",
                s.to_string(),
            )),
        }
    }
}

/// Payout workflow state.
///
/// ```text
/// Pending → Processing → Completed
///    │           └─────→ Failed
///    └─────────────────→ Failed   (pre-check failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    /// Accepted, not yet handed to the processor.
    #[default]
    Pending,
    /// Debit recorded, waiting for the processor.
    Processing,
    /// Funds moved (terminal).
    Completed,
    /// Rejected or failed at the processor (terminal).
    Failed,
}

impl PayoutStatus {
    /// Returns true if no further transition is possible.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if this state can transition to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Rule that produced a commission split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateSource {
    /// A support-structure specific custom rate.
    Custom,
    /// A product-category override.
    Category,
    /// The volume tier table.
    Tier,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom => write!(f, "CUSTOM"),
            Self::Category => write!(f, "CATEGORY"),
            Self::Tier => write!(f, "TIER"),
        }
    }
}
