//! logtriage core library
//!
//! Answers natural-language questions about application logs and, on the
//! triage path, drives automated remediation of mechanically fixable errors.

pub mod analysis;
pub mod capabilities;
pub mod chunking;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod fixer;
pub mod git;
pub mod hosting;
pub mod model_client;
pub mod pipeline;
pub mod prompts;
pub mod remediation;
pub mod store;
pub mod synthesis;
pub mod telemetry;
pub mod timerange;

pub use capabilities::{
    AnalysisModel, AnalysisReply, ChangeHost, CodeFix, FixOperation, ModelRequest, ModelTier,
    RecordStore, Remediator, VersionControl,
};
pub use config::{AnalysisLimits, ModelConfig, RemediationConfig, TriageConfig, DEFAULT_QUERY};
pub use domain::error::{Result, TriageError};
pub use domain::model::{
    ChangeId, ChangeMetadata, Finding, FixableError, LogChunk, LogRecord, RemediationOutcome,
    RemediationStatus, TimeRange,
};
pub use fixer::CommandCodeFix;
pub use git::GitCli;
pub use hosting::GithubChangeHost;
pub use model_client::HttpAnalysisModel;
pub use pipeline::{AskOutcome, AskPipeline, AskRequest, RunMetrics, EMPTY_RESULT_MESSAGE};
pub use remediation::RemediationOrchestrator;
pub use store::InsightsRecordStore;
pub use telemetry::init_tracing;
pub use timerange::{parse_time_range, resolve_time_range};
