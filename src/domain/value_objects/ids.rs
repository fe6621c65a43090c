//! # Identifiers
//!
//! Strongly-typed identifiers for ledger records.
//!
//! - UUID-based: [`TransactionId`], [`PayoutId`], [`EventId`]
//! - String-based: [`PartyId`], [`ModeratorId`], [`IdempotencyKey`]
//!
//! String identifiers come from the registration flow and the identity
//! provider and are trusted as given; they are only required to be non-blank.
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::domain::value_objects::ids::{PartyId, TransactionId};
//!
//! let seller = PartyId::new("startup-42");
//! assert_eq!(seller.as_str(), "startup-42");
//!
//! let tx = TransactionId::new_v4();
//! assert_ne!(tx, TransactionId::new_v4());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is empty or whitespace only.
            #[inline]
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier of a ledger transaction.
    TransactionId
);

uuid_id!(
    /// Unique identifier of a payout request.
    PayoutId
);

uuid_id!(
    /// Unique identifier of a domain event.
    EventId
);

string_id!(
    /// Stable identifier of a seller, support structure or the platform.
    ///
    /// Ordering is lexicographic and defines the lock acquisition order used
    /// when a sale touches several parties.
    PartyId
);

string_id!(
    /// Authenticated moderator identity supplied by the identity provider.
    ModeratorId
);

impl ModeratorId {
    /// Identity recorded for decisions made at provisioning time.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system")
    }
}

string_id!(
    /// Caller-supplied token that makes a payout request safe to retry.
    IdempotencyKey
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_parse_from_display() {
        let id = PayoutId::new_v4();
        let parsed: PayoutId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn uuid_ids_reject_garbage() {
        assert!("not-a-uuid".parse::<TransactionId>().is_err());
    }

    #[test]
    fn party_ids_order_lexicographically() {
        let mut ids = vec![PartyId::new("support-b"), PartyId::new("platform"), PartyId::new("seller-a")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(PartyId::as_str).collect();
        assert_eq!(names, ["platform", "seller-a", "support-b"]);
    }

    #[test]
    fn blank_detection() {
        assert!(IdempotencyKey::new("   ").is_blank());
        assert!(!IdempotencyKey::new("req-1").is_blank());
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let json = serde_json::to_string(&PartyId::new("seller-1")).unwrap();
        assert_eq!(json, "\"seller-1\"");
    }
}
