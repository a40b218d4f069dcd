//! Domain types and errors shared by every pipeline stage.

pub mod error;
pub mod model;

pub use error::{Result, TriageError};
pub use model::{
    ChangeId, ChangeMetadata, Finding, FixableError, LogChunk, LogRecord, RemediationOutcome,
    RemediationStatus, TimeRange,
};
