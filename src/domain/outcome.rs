//! Outcome records describing how one downstream stage handled one submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::submission::SubmissionRecord;

/// Downstream stage that produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Forward to the spreadsheet store
    SheetsRelay,

    /// Partner form replication
    BrowserReplicator,
}

/// Result classification for a stage attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Relay accepted by the remote store
    Delivered,

    /// Replication submitted and a success indicator appeared
    SuccessDetected,

    /// Replication submitted, confirmation inconclusive
    SubmittedNoIndicator,

    /// The stage failed
    Error,
}

impl OutcomeStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, OutcomeStatus::Error)
    }
}

/// One logged result of a stage attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub stage: Stage,

    pub status: OutcomeStatus,

    /// Short machine-friendly reason or error message
    pub detail: String,

    /// When the attempt finished
    pub timestamp: DateTime<Utc>,

    pub submission_id: Uuid,

    pub idempotency_key: String,

    /// The inbound payload the stage worked from
    pub original_payload: Value,
}

impl OutcomeRecord {
    /// Create an outcome for a submission with the current timestamp
    pub fn new(
        record: &SubmissionRecord,
        stage: Stage,
        status: OutcomeStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            status,
            detail: detail.into(),
            timestamp: Utc::now(),
            submission_id: record.submission_id,
            idempotency_key: record.idempotency_key.clone(),
            original_payload: record.raw.clone(),
        }
    }
}
