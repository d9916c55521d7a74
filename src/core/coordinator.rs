//! Intake coordinator: sequences capture, relay and replication for one
//! submission.
//!
//! Ordering per submission:
//! 1. general log append (and the WhatsApp log for chat submissions)
//! 2. spreadsheet relay, awaited, failures recorded and discarded
//! 3. acknowledgement produced
//! 4. browser replication detached, form submissions only
//!
//! The acknowledgement only reflects local capture. No stage failure ever
//! reaches the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::log_writer::{LogChannel, LogWriter};
use super::replicator::{PartnerForm, Replicator};
use crate::adapters::{ChromiumBrowser, LeadStore, SheetsRelay};
use crate::config::ResolvedConfig;
use crate::domain::{
    IntakeError, OutcomeRecord, OutcomeStatus, Source, Stage, SubmissionRecord, TransportHints,
};

/// Everything a submission needs, passed explicitly rather than read from
/// process-wide state
pub struct PipelineContext {
    pub logs: LogWriter,

    /// Spreadsheet store (relay stage disabled when absent)
    pub store: Option<Arc<dyn LeadStore>>,

    /// Partner form replicator (replication disabled when absent)
    pub replicator: Option<Arc<Replicator>>,
}

impl PipelineContext {
    /// Context with only local capture enabled
    pub fn new(logs: LogWriter) -> Self {
        Self {
            logs,
            store: None,
            replicator: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn LeadStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_replicator(mut self, replicator: Arc<Replicator>) -> Self {
        self.replicator = Some(replicator);
        self
    }

    /// Wire up the production adapters from configuration
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let logs = LogWriter::new(&config.log_dir);
        let mut context = Self::new(logs.clone());

        match config.sheets.endpoint {
            Some(ref endpoint) => {
                context = context.with_store(Arc::new(SheetsRelay::new(
                    endpoint.clone(),
                    config.sheets.timeout,
                )));
            }
            None => warn!("No spreadsheet endpoint configured, relay stage disabled"),
        }

        match config.partner.form_url {
            Some(ref form_url) => {
                let browser = ChromiumBrowser::new()
                    .with_head(!config.partner.headless)
                    .with_executable(config.partner.chrome_executable.clone());
                let form = PartnerForm {
                    affiliate_id: config.partner.affiliate_id.clone(),
                    destination: config.partner.destination.clone(),
                    navigation_timeout: config.partner.navigation_timeout,
                    success_wait: config.partner.success_wait,
                    ..PartnerForm::new(form_url.clone())
                };
                context = context.with_replicator(Arc::new(Replicator::new(
                    Arc::new(browser),
                    form,
                    logs,
                    config.partner.max_sessions,
                )));
            }
            None => warn!("No partner form URL configured, replication disabled"),
        }

        context
    }
}

/// Caller-facing acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub status: &'static str,
    pub message: &'static str,
}

impl Ack {
    pub const RECEIVED: Ack = Ack {
        status: "ok",
        message: "Lead received",
    };
}

/// Result of handling one submission
#[derive(Debug)]
pub struct Accepted {
    pub ack: Ack,

    pub submission_id: Uuid,

    pub source: Source,

    /// Detached replication task, if one was scheduled. Dropping the handle
    /// does not cancel the task.
    pub replication: Option<JoinHandle<OutcomeRecord>>,
}

/// One general/channel log line
#[derive(Debug, Serialize)]
struct CaptureEntry<'a> {
    submission_id: Uuid,
    idempotency_key: &'a str,
    source: Source,
    client_ip: Option<&'a str>,
    received_at: DateTime<Utc>,
    payload: &'a Value,
}

impl<'a> CaptureEntry<'a> {
    fn from_record(record: &'a SubmissionRecord) -> Self {
        Self {
            submission_id: record.submission_id,
            idempotency_key: &record.idempotency_key,
            source: record.source,
            client_ip: record.client_identity.as_deref(),
            received_at: record.received_at,
            payload: &record.raw,
        }
    }
}

/// Entry point for inbound submissions
#[derive(Clone)]
pub struct IntakeCoordinator {
    context: Arc<PipelineContext>,
}

impl IntakeCoordinator {
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Handle one submission.
    ///
    /// Only a structurally invalid payload (not a JSON object) is rejected.
    /// Every accepted submission gets the same acknowledgement.
    #[instrument(skip(self, raw, hints))]
    pub async fn handle(&self, raw: Value, hints: &TransportHints) -> Result<Accepted, IntakeError> {
        let record = Arc::new(SubmissionRecord::from_payload(raw, hints.client_identity())?);
        info!(
            submission_id = %record.submission_id,
            source = %record.source,
            "Submission received"
        );

        self.capture(&record).await;
        self.relay(&record).await;

        let ack = Ack::RECEIVED;

        let replication = match self.context.replicator {
            Some(ref replicator) if record.is_replicated() => {
                debug!(submission_id = %record.submission_id, "Scheduling replication");
                Some(replicator.spawn(Arc::clone(&record)))
            }
            _ => None,
        };

        Ok(Accepted {
            ack,
            submission_id: record.submission_id,
            source: record.source,
            replication,
        })
    }

    /// Durable capture, before any network call
    async fn capture(&self, record: &SubmissionRecord) {
        let entry = CaptureEntry::from_record(record);
        self.context.logs.append(LogChannel::Submissions, &entry).await;

        if record.source == Source::WhatsApp {
            self.context.logs.append(LogChannel::WhatsApp, &entry).await;
        }
    }

    /// Single relay attempt; failures are recorded and dropped
    async fn relay(&self, record: &SubmissionRecord) {
        let Some(ref store) = self.context.store else {
            return;
        };

        match store.relay(record).await {
            Ok(ack) => {
                info!(
                    submission_id = %record.submission_id,
                    store = store.name(),
                    status = ack.status,
                    "Lead relayed to store"
                );
            }
            Err(failure) => {
                warn!(
                    submission_id = %record.submission_id,
                    store = store.name(),
                    error = %failure,
                    "Relay failed, lead kept in local log"
                );
                let outcome = OutcomeRecord::new(
                    record,
                    Stage::SheetsRelay,
                    OutcomeStatus::Error,
                    failure.to_string(),
                );
                self.context
                    .logs
                    .append(LogChannel::SheetFailures, &outcome)
                    .await;
            }
        }
    }
}
