//! # Notifier
//!
//! Fans ledger events out to every configured dispatcher.
//!
//! [`Notifier::publish`] is fire-and-forget: delivery runs on a spawned
//! task and failures are only logged. [`Notifier::deliver`] awaits all
//! dispatchers and is what `publish` runs in the background.

use crate::domain::events::{DomainEvent, LedgerEvent};
use crate::infrastructure::notifications::traits::NotificationDispatcher;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

/// Fan-out over a set of dispatchers.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    dispatchers: Vec<Arc<dyn NotificationDispatcher>>,
}

impl Notifier {
    /// Creates a notifier without dispatchers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    /// Returns the number of dispatchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    /// Returns true if no dispatcher is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    /// Delivers `event` to every dispatcher concurrently and returns how
    /// many succeeded.
    pub async fn deliver(&self, event: &LedgerEvent) -> usize {
        let results = join_all(self.dispatchers.iter().map(|d| d.dispatch(event))).await;
        let mut delivered = 0;
        for (dispatcher, result) in self.dispatchers.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    dispatcher = dispatcher.name(),
                    event = event.event_name(),
                    event_id = %event.event_id(),
                    error = %e,
                    "Notification dispatch failed"
                ),
            }
        }
        delivered
    }

    /// Delivers `event` in the background.
    pub fn publish(&self, event: impl Into<LedgerEvent>) {
        if self.dispatchers.is_empty() {
            return;
        }
        let event = event.into();
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.deliver(&event).await;
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::events::PartyDecided;
    use crate::domain::value_objects::{ApprovalStatus, ModeratorId, PartyId};
    use crate::infrastructure::notifications::log::{RecordingDispatcher, TracingDispatcher};
    use crate::infrastructure::notifications::traits::{NotificationError, NotificationResult};
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl NotificationDispatcher for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn dispatch(&self, _event: &LedgerEvent) -> NotificationResult<()> {
            Err(NotificationError::delivery("unreachable"))
        }
    }

    fn event() -> LedgerEvent {
        PartyDecided::new(PartyId::new("p"), ApprovalStatus::Rejected, ModeratorId::new("m")).into()
    }

    #[tokio::test]
    async fn failing_dispatcher_does_not_block_others() {
        let recorder = RecordingDispatcher::new();
        let notifier = Notifier::new()
            .with_dispatcher(Arc::new(Broken))
            .with_dispatcher(Arc::new(TracingDispatcher))
            .with_dispatcher(Arc::new(recorder.clone()));

        assert_eq!(notifier.deliver(&event()).await, 2);
        assert_eq!(recorder.event_names(), vec!["PartyDecided"]);
    }

    #[tokio::test]
    async fn publish_runs_in_background() {
        let recorder = RecordingDispatcher::new();
        let notifier = Notifier::new().with_dispatcher(Arc::new(recorder.clone()));

        notifier.publish(event());
        for _ in 0..50 {
            if !recorder.events().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(recorder.events().len(), 1);
    }
}
