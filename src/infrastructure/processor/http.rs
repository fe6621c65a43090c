//! # HTTP Payment Processor
//!
//! [`PaymentProcessor`] adapter for a JSON-over-HTTP processor API.
//!
//! The adapter posts a [`PayoutSubmission`] to `{base_url}/payouts` and
//! expects a [`ProcessorOutcome`] body. Non-2xx statuses map to
//! [`ProcessorError`] variants; a 2xx with `"status": "DECLINED"` is a normal
//! declined outcome.

use crate::infrastructure::processor::error::{ProcessorError, ProcessorResult};
use crate::infrastructure::processor::traits::{
    PaymentProcessor, PayoutSubmission, ProcessorOutcome,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP adapter for the payment processor.
#[derive(Debug, Clone)]
pub struct HttpPaymentProcessor {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpPaymentProcessor {
    /// Creates an adapter for the processor at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError::Internal` if the client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> ProcessorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ProcessorError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_ms,
        })
    }

    /// Returns the configured timeout in milliseconds.
    #[inline]
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    async fn handle_response(&self, response: Response) -> ProcessorResult<ProcessorOutcome> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<ProcessorOutcome>()
                .await
                .map_err(|e| ProcessorError::protocol(format!("Failed to parse response: {e}")));
        }
        let body = response.text().await.unwrap_or_default();
        Err(self.map_status_error(status, &body))
    }

    fn map_reqwest_error(&self, error: &reqwest::Error) -> ProcessorError {
        if error.is_timeout() {
            ProcessorError::timeout("Request timed out", Some(self.timeout_ms))
        } else if error.is_connect() {
            ProcessorError::connection(format!("Connection failed: {error}"))
        } else {
            ProcessorError::connection(format!("HTTP request failed: {error}"))
        }
    }

    fn map_status_error(&self, status: StatusCode, body: &str) -> ProcessorError {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProcessorError::invalid_request(format!("Bad request: {body}"))
            }
            StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => {
                ProcessorError::timeout(format!("Upstream timeout ({status})"), Some(self.timeout_ms))
            }
            s if s.is_server_error() => {
                ProcessorError::connection(format!("Server error ({status}): {body}"))
            }
            _ => ProcessorError::protocol(format!("HTTP error ({status}): {body}")),
        }
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, submission: &PayoutSubmission) -> ProcessorResult<ProcessorOutcome> {
        let url = format!("{}/payouts", self.base_url);
        debug!(payout_id = %submission.payout_id, url = %url, "Submitting payout");

        let response = self
            .client
            .post(&url)
            .json(submission)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(&e))?;

        let outcome = self.handle_response(response).await;
        if let Err(e) = &outcome {
            warn!(payout_id = %submission.payout_id, error = %e, "Processor call failed");
        }
        outcome
    }
}
