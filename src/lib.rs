//! leadrelay - Durable lead intake relay
//!
//! Accepts lead submissions from a website form or a chat widget and makes
//! sure none is lost when downstream systems are unavailable.
//!
//! # Architecture
//!
//! Each submission flows one way:
//! - Captured to append-only JSONL logs before any network call
//! - Forwarded once to a spreadsheet-backed store (failures are logged)
//! - Acknowledged to the caller
//! - Form submissions only: replicated into a partner's web form by a
//!   detached headless-browser task
//!
//! # Modules
//!
//! - `adapters`: External integrations (spreadsheet store, Chromium)
//! - `core`: Pipeline logic (LogWriter, Replicator, IntakeCoordinator)
//! - `domain`: Data structures (SubmissionRecord, OutcomeRecord)
//! - `server`: HTTP intake surface
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Serve the intake endpoint
//! leadrelay serve --bind 0.0.0.0:8080
//!
//! # Push one payload through the pipeline
//! echo '{"name": "Ana", "phone": "+351..."}' | leadrelay submit
//!
//! # Inspect a log channel
//! leadrelay logs replicator --limit 5
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;

// Re-export main types at crate root for convenience
pub use crate::core::{Accepted, Ack, IntakeCoordinator, LogChannel, LogWriter, PipelineContext};
pub use domain::{OutcomeRecord, OutcomeStatus, Source, SubmissionRecord, TransportHints};
