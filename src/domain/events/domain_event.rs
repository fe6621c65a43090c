//! # Domain Event Trait
//!
//! Shared shape of every ledger event: who it concerns, when it happened,
//! and which area of the ledger raised it.

use crate::domain::value_objects::timestamp::Timestamp;
use crate::domain::value_objects::{EventId, PartyId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger area an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A sale and its commissions were booked.
    Sale,
    /// A payout settled, failed or was reconciled.
    Payout,
    /// A party entered or left moderation.
    Approval,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sale => "SALE",
            Self::Payout => "PAYOUT",
            Self::Approval => "APPROVAL",
        })
    }
}

/// A committed ledger fact, published to notification dispatchers.
///
/// Events are raised only after the write they describe has succeeded.
pub trait DomainEvent: Send + Sync + fmt::Debug {
    /// Unique id of this event.
    fn event_id(&self) -> EventId;

    /// The party the event concerns first.
    fn party_id(&self) -> &PartyId;

    /// When the underlying change was committed.
    fn timestamp(&self) -> Timestamp;

    /// Ledger area.
    fn event_type(&self) -> EventType;

    /// Stable name, e.g. `"SaleSettled"`.
    fn event_name(&self) -> &'static str;
}

/// Id, subject and time carried by every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Event id.
    pub event_id: EventId,
    /// Subject party.
    pub party_id: PartyId,
    /// Commit time.
    pub timestamp: Timestamp,
}

impl EventMetadata {
    /// Stamps a fresh event about `party_id` at the current time.
    #[must_use]
    pub fn for_party(party_id: PartyId) -> Self {
        Self::from_parts(EventId::new_v4(), party_id, Timestamp::now())
    }

    /// Rebuilds metadata read back from a sink.
    #[must_use]
    pub fn from_parts(event_id: EventId, party_id: PartyId, timestamp: Timestamp) -> Self {
        Self {
            event_id,
            party_id,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_display_matches_wire_name() {
        for kind in [EventType::Sale, EventType::Payout, EventType::Approval] {
            let wire = serde_json::to_value(kind).ok();
            assert_eq!(wire, Some(serde_json::Value::String(kind.to_string())));
        }
    }

    #[test]
    fn fresh_metadata_gets_unique_ids() {
        let a = EventMetadata::for_party(PartyId::new("seller"));
        let b = EventMetadata::for_party(PartyId::new("seller"));
        assert_ne!(a.event_id, b.event_id);
    }
}
