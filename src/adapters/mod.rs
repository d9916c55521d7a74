//! Adapter interfaces for external systems.
//!
//! Adapters wrap the two outbound integrations: the spreadsheet-backed lead
//! store (plain HTTP) and the partner web form (driven through a headless
//! browser). Both sit behind traits so the pipeline can be exercised with
//! in-process fakes.

pub mod chromium;
pub mod sheets;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::SubmissionRecord;

// Re-export the concrete adapters
pub use chromium::ChromiumBrowser;
pub use sheets::SheetsRelay;

/// Confirmation returned by a successful relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayAck {
    /// HTTP status returned by the store
    pub status: u16,
}

/// Why a relay did not land
#[derive(Debug, Clone, Error)]
pub enum RelayFailure {
    #[error("Store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A remote store that accepts lead records
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Human-readable store name
    fn name(&self) -> &str;

    /// Forward one record. Exactly one attempt is made.
    async fn relay(&self, record: &SubmissionRecord) -> Result<RelayAck, RelayFailure>;
}

/// Errors raised while driving the partner form
#[derive(Debug, Clone, Error)]
pub enum ReplicationError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("no_submit_button_found")]
    NoSubmitControl,

    #[error("page interaction failed: {0}")]
    Page(String),

    #[error("session limit unavailable: {0}")]
    Saturated(String),
}

/// Launches isolated browser sessions
#[async_trait]
pub trait FormBrowser: Send + Sync {
    /// Start a fresh session with one blank page
    async fn open(&self) -> Result<Box<dyn FormPage>, ReplicationError>;
}

/// One page inside a browser session.
///
/// Selectors are CSS selectors. `close` must be safe to call on every exit
/// path and releases the whole session.
#[async_trait]
pub trait FormPage: Send {
    /// Navigate and wait for the load to finish, bounded by `timeout`
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ReplicationError>;

    /// Whether at least one element matches `selector`
    async fn exists(&mut self, selector: &str) -> Result<bool, ReplicationError>;

    /// Set the value of the first element matching `selector`
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), ReplicationError>;

    /// Click the first element matching `selector`
    async fn click(&mut self, selector: &str) -> Result<(), ReplicationError>;

    /// Release the session
    async fn close(&mut self) -> Result<(), ReplicationError>;
}
