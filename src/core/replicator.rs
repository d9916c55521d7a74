//! Best-effort replication of leads into the partner's web form.
//!
//! Each replication runs as a detached task behind a session semaphore:
//!
//! ```text
//! Idle -> Navigated -> FieldsFilled -> Submitted -> {SuccessDetected | Inconclusive} -> Closed
//!   \__________\______________\____________\_____________________> Errored -> Closed
//! ```
//!
//! Missing form fields are skipped, a missing submit control aborts the
//! attempt, and a missing success indicator is recorded as inconclusive
//! rather than as an error. Exactly one outcome is logged per attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::log_writer::{LogChannel, LogWriter};
use super::notes::compose_notes;
use crate::adapters::{FormBrowser, FormPage, ReplicationError};
use crate::domain::{OutcomeRecord, OutcomeStatus, Stage, SubmissionRecord};

/// Affiliate identifier field
pub const AFFILIATE_SELECTOR: &str = r#"input[name="affiliate_id"]"#;
/// Destination city field (input or select)
pub const DESTINATION_SELECTOR: &str = r#"[name="city"]"#;
pub const NAME_SELECTOR: &str = r#"input[name="name"]"#;
pub const PHONE_SELECTOR: &str = r#"input[name="phone"]"#;
pub const NOTES_SELECTOR: &str = r#"textarea[name="notes"]"#;

/// Submit control shapes, probed in order
pub const SUBMIT_SELECTORS: [&str; 3] = [
    r#"form button[type="submit"]"#,
    r#"form input[type="submit"]"#,
    "form button:not([type])",
];

/// Elements whose styling signals a positive result
pub const SUCCESS_SELECTOR: &str =
    r#".alert-success, .success, .text-success, [class*="success"]"#;

/// Fixed parameters of the partner form
#[derive(Debug, Clone)]
pub struct PartnerForm {
    pub form_url: String,
    pub affiliate_id: String,
    pub destination: String,
    /// Upper bound on the initial navigation
    pub navigation_timeout: Duration,
    /// Upper bound on waiting for the success indicator
    pub success_wait: Duration,
    /// Interval between success indicator probes
    pub poll_interval: Duration,
}

impl PartnerForm {
    pub fn new(form_url: impl Into<String>) -> Self {
        Self {
            form_url: form_url.into(),
            affiliate_id: String::new(),
            destination: String::new(),
            navigation_timeout: Duration::from_secs(30),
            success_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Progress of a single replication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationState {
    Idle,
    Navigated,
    FieldsFilled,
    Submitted,
    SuccessDetected,
    Inconclusive,
    Errored,
    Closed,
}

/// Terminal result of a submitted form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirmation {
    SuccessDetected,
    Inconclusive,
}

/// Drives the partner form for form-sourced leads
pub struct Replicator {
    browser: Arc<dyn FormBrowser>,
    form: PartnerForm,
    logs: LogWriter,
    sessions: Arc<Semaphore>,
}

impl Replicator {
    /// Create a replicator allowing at most `max_sessions` concurrent
    /// browser sessions. Further attempts wait for a free slot.
    pub fn new(
        browser: Arc<dyn FormBrowser>,
        form: PartnerForm,
        logs: LogWriter,
        max_sessions: usize,
    ) -> Self {
        Self {
            browser,
            form,
            logs,
            sessions: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    pub fn form(&self) -> &PartnerForm {
        &self.form
    }

    /// Run a replication as a detached task
    pub fn spawn(self: &Arc<Self>, record: Arc<SubmissionRecord>) -> JoinHandle<OutcomeRecord> {
        let replicator = Arc::clone(self);
        tokio::spawn(async move { replicator.replicate(&record).await })
    }

    /// Replicate one record and log exactly one outcome.
    ///
    /// Never fails: every error is folded into the returned outcome.
    #[instrument(skip(self, record), fields(submission_id = %record.submission_id))]
    pub async fn replicate(&self, record: &SubmissionRecord) -> OutcomeRecord {
        let result = match Arc::clone(&self.sessions).acquire_owned().await {
            Ok(_permit) => self.attempt(record).await,
            Err(e) => Err(ReplicationError::Saturated(e.to_string())),
        };

        let outcome = match result {
            Ok(Confirmation::SuccessDetected) => OutcomeRecord::new(
                record,
                Stage::BrowserReplicator,
                OutcomeStatus::SuccessDetected,
                "success_detected",
            ),
            Ok(Confirmation::Inconclusive) => OutcomeRecord::new(
                record,
                Stage::BrowserReplicator,
                OutcomeStatus::SubmittedNoIndicator,
                "submitted_no_indicator",
            ),
            Err(e) => {
                warn!(error = %e, "Partner form replication failed");
                OutcomeRecord::new(
                    record,
                    Stage::BrowserReplicator,
                    OutcomeStatus::Error,
                    e.to_string(),
                )
            }
        };

        info!(status = ?outcome.status, detail = %outcome.detail, "Replication finished");
        self.logs.append(LogChannel::Replicator, &outcome).await;
        outcome
    }

    /// One browser session, released on every exit path
    async fn attempt(&self, record: &SubmissionRecord) -> Result<Confirmation, ReplicationError> {
        let mut state = ReplicationState::Idle;
        let mut page = self.browser.open().await?;

        let result = self.drive(page.as_mut(), record, &mut state).await;
        if result.is_err() {
            transition(&mut state, ReplicationState::Errored);
        }

        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to release browser session");
        }
        transition(&mut state, ReplicationState::Closed);

        result
    }

    async fn drive(
        &self,
        page: &mut dyn FormPage,
        record: &SubmissionRecord,
        state: &mut ReplicationState,
    ) -> Result<Confirmation, ReplicationError> {
        page.goto(&self.form.form_url, self.form.navigation_timeout)
            .await?;
        transition(state, ReplicationState::Navigated);

        let notes = compose_notes(&record.tour_context);
        let fields = [
            (AFFILIATE_SELECTOR, Some(self.form.affiliate_id.as_str())),
            (DESTINATION_SELECTOR, Some(self.form.destination.as_str())),
            (NAME_SELECTOR, record.contact.name.as_deref()),
            (PHONE_SELECTOR, record.contact.phone.as_deref()),
            (NOTES_SELECTOR, Some(notes.as_str())),
        ];

        for (selector, value) in fields {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                debug!(selector, "No value for field, skipping");
                continue;
            };
            if !page.exists(selector).await? {
                debug!(selector, "Field not present on form, skipping");
                continue;
            }
            page.fill(selector, value).await?;
        }
        transition(state, ReplicationState::FieldsFilled);

        let submit = find_submit(page).await?.ok_or(ReplicationError::NoSubmitControl)?;
        page.click(submit).await?;
        transition(state, ReplicationState::Submitted);

        let confirmation = self.await_indicator(page).await;
        transition(
            state,
            match confirmation {
                Confirmation::SuccessDetected => ReplicationState::SuccessDetected,
                Confirmation::Inconclusive => ReplicationState::Inconclusive,
            },
        );
        Ok(confirmation)
    }

    /// Poll for the success indicator until the wait bound elapses.
    ///
    /// Probe errors count as "not yet": the page is usually mid-navigation
    /// after a submit.
    async fn await_indicator(&self, page: &mut dyn FormPage) -> Confirmation {
        let poll = async {
            loop {
                match page.exists(SUCCESS_SELECTOR).await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => debug!(error = %e, "Success probe failed"),
                }
                tokio::time::sleep(self.form.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.form.success_wait, poll).await {
            Ok(()) => Confirmation::SuccessDetected,
            Err(_) => Confirmation::Inconclusive,
        }
    }
}

async fn find_submit(page: &mut dyn FormPage) -> Result<Option<&'static str>, ReplicationError> {
    for selector in SUBMIT_SELECTORS {
        if page.exists(selector).await? {
            return Ok(Some(selector));
        }
    }
    Ok(None)
}

fn transition(state: &mut ReplicationState, next: ReplicationState) {
    debug!(from = ?*state, to = ?next, "Replication state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_form_defaults() {
        let form = PartnerForm::new("https://partner.example/lead");
        assert_eq!(form.navigation_timeout, Duration::from_secs(30));
        assert!(form.success_wait < form.navigation_timeout);
        assert!(form.affiliate_id.is_empty());
    }

    #[test]
    fn test_transition_updates_state() {
        let mut state = ReplicationState::Idle;
        transition(&mut state, ReplicationState::Navigated);
        assert_eq!(state, ReplicationState::Navigated);
    }

    #[test]
    fn test_submit_shapes_are_form_scoped() {
        for selector in SUBMIT_SELECTORS {
            assert!(selector.starts_with("form "));
        }
    }
}
