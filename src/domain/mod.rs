//! Domain types for the lead relay.
//!
//! This module contains the core data structures:
//! - Submission: the immutable lead record and its parts
//! - Outcome: per-stage result records

pub mod outcome;
pub mod submission;

// Re-export commonly used types
pub use outcome::{OutcomeRecord, OutcomeStatus, Stage};
pub use submission::{
    idempotency_key, ClientIdentity, Contact, IntakeError, Source, SubmissionRecord, TourContext,
    Tours, TransportHints,
};
