//! Spreadsheet store relay.
//!
//! POSTs the raw lead payload as JSON to a store endpoint (typically a
//! spreadsheet web-app hook). One attempt per submission, bounded by a
//! fixed timeout.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{LeadStore, RelayAck, RelayFailure};
use crate::domain::SubmissionRecord;

/// Longest response body kept in a failure record
const MAX_BODY_CHARS: usize = 500;

/// HTTP client for the spreadsheet store
pub struct SheetsRelay {
    /// Store endpoint URL
    endpoint: String,
    /// Per-call timeout
    timeout: Duration,
    /// HTTP client
    client: reqwest::Client,
}

impl SheetsRelay {
    /// Create a new relay
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, error: reqwest::Error) -> RelayFailure {
        if error.is_timeout() {
            RelayFailure::Timeout(self.timeout)
        } else {
            RelayFailure::Transport(error.to_string())
        }
    }
}

#[async_trait]
impl LeadStore for SheetsRelay {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn relay(&self, record: &SubmissionRecord) -> Result<RelayAck, RelayFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header("Idempotency-Key", record.idempotency_key.as_str())
            .json(&record.raw)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Store accepted lead");
            return Ok(RelayAck {
                status: status.as_u16(),
            });
        }

        let body = match response.text().await {
            Ok(text) => text.chars().take(MAX_BODY_CHARS).collect(),
            Err(e) => format!("<unreadable body: {}>", e),
        };

        Err(RelayFailure::Status {
            status: status.as_u16(),
            body,
        })
    }
}
