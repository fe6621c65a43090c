//! # Webhook Dispatcher
//!
//! Posts each [`LedgerEvent`] as JSON to a fixed URL. The body is the
//! event's serde form, tagged with its `type`.

use crate::domain::events::{DomainEvent, LedgerEvent};
use crate::infrastructure::notifications::traits::{
    NotificationDispatcher, NotificationError, NotificationResult,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// HTTP webhook dispatcher.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: Client,
    url: String,
}

impl WebhookDispatcher {
    /// Creates a dispatcher posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Delivery` if the client cannot be created.
    pub fn new(url: impl Into<String>, timeout_ms: u64) -> NotificationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| NotificationError::delivery(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Returns the target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn dispatch(&self, event: &LedgerEvent) -> NotificationResult<()> {
        let response = self
            .client
            .post(&self.url)
            .header("X-Ledger-Event", event.event_name())
            .header("X-Ledger-Event-Id", event.event_id().to_string())
            .json(event)
            .send()
            .await
            .map_err(|e| NotificationError::delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::events::PartyDecided;
    use crate::domain::value_objects::{ApprovalStatus, ModeratorId, PartyId};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn decided() -> LedgerEvent {
        PartyDecided::new(
            PartyId::new("startup-1"),
            ApprovalStatus::Approved,
            ModeratorId::new("mod-1"),
        )
        .into()
    }

    #[tokio::test]
    async fn posts_tagged_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/ledger"))
            .and(header("X-Ledger-Event", "PartyDecided"))
            .and(body_partial_json(json!({"type": "PartyDecided"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dispatcher = WebhookDispatcher::new(format!("{}/hooks/ledger", server.uri()), 1_000).unwrap();
        dispatcher.dispatch(&decided()).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dispatcher = WebhookDispatcher::new(server.uri(), 1_000).unwrap();
        let err = dispatcher.dispatch(&decided()).await.unwrap_err();

        assert!(matches!(err, NotificationError::Rejected { status: 500 }));
    }
}
