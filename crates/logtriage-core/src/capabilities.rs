//! Capability traits — the seams between the core pipeline and its external
//! collaborators (record store, model, version control, code fixer, change
//! hosting).
//!
//! Every stage receives its capabilities as `Arc<dyn …>` handles injected by
//! the caller; nothing here is global. Tests substitute the in-memory fakes
//! from [`crate::fakes`].

use std::path::Path;

use async_trait::async_trait;

use crate::domain::error::Result;
use crate::domain::model::{
    ChangeId, ChangeMetadata, FixableError, LogRecord, RemediationOutcome, TimeRange,
};

/// Executes a query against the external log store over a time range.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch all records matching `query` within `range`, oldest first.
    ///
    /// Fails with `StoreUnavailable` or `QueryInvalid`.
    async fn fetch(&self, query: &str, range: &TimeRange) -> Result<Vec<LogRecord>>;
}

/// Which model tier a request should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Full-strength model for analysis and triage.
    Reasoning,
    /// Cheaper tier for pure summarization (change metadata).
    Summary,
}

/// One language-model invocation with a structured-output contract.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    /// Ordered user-turn parts, concatenated by the backend.
    pub parts: Vec<String>,
    pub tier: ModelTier,
}

/// Structured reply from an analysis-tier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReply {
    pub summary: String,
    pub fixable_errors: Vec<FixableError>,
}

/// Language-model-backed analysis capability.
#[async_trait]
pub trait AnalysisModel: Send + Sync {
    /// Run one analysis call and parse the structured reply.
    ///
    /// Fails with `ModelUnavailable` or `ResponseMalformed`.
    async fn analyze(&self, request: ModelRequest) -> Result<AnalysisReply>;

    /// Produce change metadata from a fix report (summary tier).
    async fn change_metadata(&self, fix_report: &str) -> Result<ChangeMetadata>;
}

/// Operations the code-fix capability may be granted on the working copy.
///
/// The orchestrator only ever grants `FileRead` and `FileEdit`; the other
/// variants exist so implementations can reject anything broader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixOperation {
    FileRead,
    FileEdit,
    FileCreate,
    Shell,
}

impl std::fmt::Display for FixOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixOperation::FileRead => write!(f, "Read"),
            FixOperation::FileEdit => write!(f, "Edit"),
            FixOperation::FileCreate => write!(f, "Write"),
            FixOperation::Shell => write!(f, "Bash"),
        }
    }
}

/// Bounded external code-fix capability.
#[async_trait]
pub trait CodeFix: Send + Sync {
    /// Apply a fix for `task` inside `work_dir`, restricted to `allowed`
    /// operations. Returns the fixer's textual report, or `None` when it
    /// produced no usable result.
    async fn apply(
        &self,
        task: &str,
        work_dir: &Path,
        allowed: &[FixOperation],
    ) -> Result<Option<String>>;
}

/// Version-control operations against the single working copy.
///
/// Each call may fail with `AuthFailure` or `NetworkFailure`.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `remote_url` into `work_dir` unless a clone already exists.
    async fn ensure_clone(&self, remote_url: &str, work_dir: &Path) -> Result<()>;

    /// Fast-forward the working copy to the remote's current state.
    async fn pull(&self, remote_url: &str, work_dir: &Path) -> Result<()>;

    async fn list_remote_branches(&self, work_dir: &Path) -> Result<Vec<String>>;

    /// Create `branch` locally and switch to it.
    async fn create_branch(&self, work_dir: &Path, branch: &str) -> Result<()>;

    /// Stage every working-copy change and commit with `message`.
    async fn commit_all(&self, work_dir: &Path, message: &str) -> Result<()>;

    async fn push(&self, remote_url: &str, work_dir: &Path, branch: &str) -> Result<()>;
}

/// Opens proposed changes on the hosting side.
#[async_trait]
pub trait ChangeHost: Send + Sync {
    /// Fails with `AuthFailure` or `BaseBranchMissing`.
    async fn create_change(
        &self,
        branch: &str,
        base: &str,
        metadata: &ChangeMetadata,
    ) -> Result<ChangeId>;
}

/// Handle through which the triage stage registers an error for remediation.
///
/// Injected into the analysis context as an explicit capability, never
/// ambient state; the synthesis stage is never given one.
#[async_trait]
pub trait Remediator: Send + Sync {
    async fn remediate(&self, error: &FixableError) -> Result<RemediationOutcome>;
}
