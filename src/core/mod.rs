//! Core relay pipeline.
//!
//! This module contains:
//! - LogWriter: Append-only JSONL capture
//! - Notes: Free-text notes composition
//! - Replicator: Partner form replication
//! - IntakeCoordinator: Per-submission sequencing

pub mod coordinator;
pub mod log_writer;
pub mod notes;
pub mod replicator;

// Re-export commonly used types
pub use coordinator::{Accepted, Ack, IntakeCoordinator, PipelineContext};
pub use log_writer::{LogChannel, LogWriteError, LogWriter};
pub use notes::{compose_notes, CHANNEL_MARKER};
pub use replicator::{PartnerForm, ReplicationState, Replicator};
