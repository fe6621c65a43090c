//! Dispatchers that keep events in-process: one writes them to the tracing
//! log, the other records them for inspection.

use crate::domain::events::{DomainEvent, LedgerEvent};
use crate::infrastructure::notifications::traits::{NotificationDispatcher, NotificationResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Writes every event to the `ledger::events` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn dispatch(&self, event: &LedgerEvent) -> NotificationResult<()> {
        info!(
            target: "ledger::events",
            event_id = %event.event_id(),
            event = event.event_name(),
            event_type = %event.event_type(),
            party_id = %event.party_id(),
            "Ledger event"
        );
        Ok(())
    }
}

/// Keeps every dispatched event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl RecordingDispatcher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events in dispatch order.
    #[must_use]
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    /// Returns the names of the recorded events.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.event_name()).collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn dispatch(&self, event: &LedgerEvent) -> NotificationResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
