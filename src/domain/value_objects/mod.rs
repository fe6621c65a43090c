//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`TransactionId`], [`PayoutId`], [`EventId`]: UUID-based identifiers
//! - [`PartyId`], [`ModeratorId`], [`IdempotencyKey`]: String-based identifiers
//!
//! ## Numeric Types
//!
//! - [`Amount`]: Non-negative fixed-point amount with cent precision
//! - [`BasisPoints`]: Integer share in 1/100 of a percent
//! - [`Currency`]: ISO 4217 code
//!
//! ## Arithmetic
//!
//! - [`ArithmeticError`]: Overflow, underflow and division failures
//! - [`arithmetic::truncate_to_scale`]: Cent truncation used for every share

pub mod arithmetic;
pub mod basis_points;
pub mod enums;
pub mod ids;
pub mod money;
pub mod timestamp;

pub use arithmetic::{ArithmeticError, ArithmeticResult};
pub use basis_points::BasisPoints;
pub use enums::{
    ApprovalStatus, Decision, ParseEnumError, PartyKind, PayoutStatus, RateSource,
    TransactionStatus, TransactionType,
};
pub use ids::{EventId, IdempotencyKey, ModeratorId, PartyId, PayoutId, TransactionId};
pub use money::{Amount, Currency, MINOR_UNIT_SCALE};
pub use timestamp::Timestamp;
