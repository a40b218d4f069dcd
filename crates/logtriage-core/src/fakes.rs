//! In-memory fakes for the capability traits (testing only)
//!
//! Each fake records the calls it receives so tests can assert on side
//! effects, in particular the zero-write properties of the remediation
//! paths. State lives behind an `Arc<Mutex<…>>` so a test can keep a
//! cloned handle after coercing the fake into an `Arc<dyn Trait>`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::capabilities::{
    AnalysisModel, AnalysisReply, ChangeHost, CodeFix, FixOperation, ModelRequest, RecordStore,
    Remediator, VersionControl,
};
use crate::domain::error::{Result, TriageError};
use crate::domain::model::{
    ChangeId, ChangeMetadata, FixableError, LogRecord, RemediationOutcome, RemediationStatus,
    TimeRange,
};

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

enum Script {
    /// Every analyze call returns the same reply.
    Fixed(AnalysisReply),
    /// Each analyze call echoes the `chunk_index` found in its payload, so
    /// tests can trace which chunk produced which summary. Indices listed in
    /// `fail` error out with `ModelUnavailable` instead.
    PerChunk { fail: HashSet<usize> },
    /// Every analyze call fails.
    Unavailable(String),
}

struct ScriptedModelState {
    script: Script,
    metadata_reply: ChangeMetadata,
    analyze_requests: Vec<ModelRequest>,
    metadata_requests: Vec<String>,
}

/// Scripted [`AnalysisModel`] that records every request it receives.
#[derive(Clone)]
pub struct ScriptedModel {
    state: Arc<Mutex<ScriptedModelState>>,
}

impl ScriptedModel {
    fn with_script(script: Script) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedModelState {
                script,
                metadata_reply: ChangeMetadata {
                    title: "fix detected error".to_string(),
                    description: "Automated fix for a recurring error.".to_string(),
                },
                analyze_requests: Vec::new(),
                metadata_requests: Vec::new(),
            })),
        }
    }

    /// Every analyze call answers with `summary` and no fixable errors.
    pub fn answering(summary: &str) -> Self {
        Self::with_script(Script::Fixed(AnalysisReply {
            summary: summary.to_string(),
            fixable_errors: Vec::new(),
        }))
    }

    /// Every analyze call answers with the given structured reply.
    pub fn replying(reply: AnalysisReply) -> Self {
        Self::with_script(Script::Fixed(reply))
    }

    /// Each analyze call answers `"analysis of chunk N"`, where N is the
    /// one-based `chunk_index` embedded in the request payload.
    pub fn echoing_chunks() -> Self {
        Self::with_script(Script::PerChunk {
            fail: HashSet::new(),
        })
    }

    /// Like [`ScriptedModel::echoing_chunks`], but the listed one-based
    /// chunk indices fail with `ModelUnavailable`.
    pub fn echoing_chunks_failing(fail: &[usize]) -> Self {
        Self::with_script(Script::PerChunk {
            fail: fail.iter().copied().collect(),
        })
    }

    /// Every analyze call fails with `ModelUnavailable`.
    pub fn unavailable(detail: &str) -> Self {
        Self::with_script(Script::Unavailable(detail.to_string()))
    }

    /// Override the canned change-metadata reply.
    pub fn with_change_metadata(self, title: &str, description: &str) -> Self {
        self.state.lock().unwrap().metadata_reply = ChangeMetadata {
            title: title.to_string(),
            description: description.to_string(),
        };
        self
    }

    pub fn analyze_calls(&self) -> usize {
        self.state.lock().unwrap().analyze_requests.len()
    }

    pub fn last_analyze_request(&self) -> Option<ModelRequest> {
        self.state.lock().unwrap().analyze_requests.last().cloned()
    }

    pub fn metadata_calls(&self) -> usize {
        self.state.lock().unwrap().metadata_requests.len()
    }
}

/// One-based `chunk_index` embedded in a worker payload, if any.
fn chunk_index_of(request: &ModelRequest) -> Option<usize> {
    let payload = request.parts.join("\n");
    let start = payload.find("\"chunk_index\":")? + "\"chunk_index\":".len();
    let digits: String = payload[start..]
        .chars()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[async_trait]
impl AnalysisModel for ScriptedModel {
    async fn analyze(&self, request: ModelRequest) -> Result<AnalysisReply> {
        let mut state = self.state.lock().unwrap();
        // Coordinator payloads embed worker chunk indices; only worker calls
        // should echo one.
        let index = if request.system_prompt.contains("log analysis coordinator") {
            None
        } else {
            chunk_index_of(&request)
        };
        state.analyze_requests.push(request);
        match &state.script {
            Script::Fixed(reply) => Ok(reply.clone()),
            Script::PerChunk { fail } => match index {
                Some(i) if fail.contains(&i) => Err(TriageError::ModelUnavailable(format!(
                    "scripted failure for chunk {i}"
                ))),
                Some(i) => Ok(AnalysisReply {
                    summary: format!("analysis of chunk {i}"),
                    fixable_errors: Vec::new(),
                }),
                // Coordinator calls carry no chunk_index.
                None => Ok(AnalysisReply {
                    summary: "combined analysis".to_string(),
                    fixable_errors: Vec::new(),
                }),
            },
            Script::Unavailable(detail) => Err(TriageError::ModelUnavailable(detail.clone())),
        }
    }

    async fn change_metadata(&self, fix_report: &str) -> Result<ChangeMetadata> {
        let mut state = self.state.lock().unwrap();
        state.metadata_requests.push(fix_report.to_string());
        Ok(state.metadata_reply.clone())
    }
}

// ---------------------------------------------------------------------------
// StaticRecordStore
// ---------------------------------------------------------------------------

struct StaticRecordStoreState {
    records: Vec<LogRecord>,
    failure: Option<String>,
    queries: Vec<String>,
}

/// [`RecordStore`] returning a fixed record sequence.
#[derive(Clone)]
pub struct StaticRecordStore {
    state: Arc<Mutex<StaticRecordStoreState>>,
}

impl StaticRecordStore {
    pub fn with_records(records: Vec<LogRecord>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StaticRecordStoreState {
                records,
                failure: None,
                queries: Vec::new(),
            })),
        }
    }

    pub fn empty() -> Self {
        Self::with_records(Vec::new())
    }

    /// Every fetch fails with `StoreUnavailable`.
    pub fn unavailable(detail: &str) -> Self {
        let store = Self::empty();
        store.state.lock().unwrap().failure = Some(detail.to_string());
        store
    }

    pub fn last_query(&self) -> Option<String> {
        self.state.lock().unwrap().queries.last().cloned()
    }
}

#[async_trait]
impl RecordStore for StaticRecordStore {
    async fn fetch(&self, query: &str, _range: &TimeRange) -> Result<Vec<LogRecord>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        match &state.failure {
            Some(detail) => Err(TriageError::StoreUnavailable(detail.clone())),
            None => Ok(state.records.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingVcs
// ---------------------------------------------------------------------------

struct RecordingVcsState {
    remote_branches: Vec<String>,
    calls: Vec<String>,
    acquire_failure: Option<String>,
}

/// [`VersionControl`] fake with a scripted remote branch list and a call log.
///
/// `create_branch`, `commit_all` and `push` count as writes; the zero-write
/// tests assert that [`RecordingVcs::write_calls`] stays at zero.
#[derive(Clone)]
pub struct RecordingVcs {
    state: Arc<Mutex<RecordingVcsState>>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingVcsState {
                remote_branches: Vec::new(),
                calls: Vec::new(),
                acquire_failure: None,
            })),
        }
    }

    pub fn with_remote_branches(self, branches: &[&str]) -> Self {
        self.state.lock().unwrap().remote_branches =
            branches.iter().map(|b| b.to_string()).collect();
        self
    }

    /// `ensure_clone` and `pull` fail with `NetworkFailure`.
    pub fn failing_acquire(self, detail: &str) -> Self {
        self.state.lock().unwrap().acquire_failure = Some(detail.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn write_calls(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| {
                c.starts_with("create_branch")
                    || c.starts_with("commit_all")
                    || c.starts_with("push")
            })
            .count()
    }

    pub fn pushed_branches(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| c.strip_prefix("push ").map(str::to_string))
            .collect()
    }
}

impl Default for RecordingVcs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionControl for RecordingVcs {
    async fn ensure_clone(&self, _remote_url: &str, _work_dir: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("ensure_clone".to_string());
        match &state.acquire_failure {
            Some(detail) => Err(TriageError::NetworkFailure(detail.clone())),
            None => Ok(()),
        }
    }

    async fn pull(&self, _remote_url: &str, _work_dir: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("pull".to_string());
        match &state.acquire_failure {
            Some(detail) => Err(TriageError::NetworkFailure(detail.clone())),
            None => Ok(()),
        }
    }

    async fn list_remote_branches(&self, _work_dir: &Path) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_remote_branches".to_string());
        Ok(state.remote_branches.clone())
    }

    async fn create_branch(&self, _work_dir: &Path, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_branch {branch}"));
        Ok(())
    }

    async fn commit_all(&self, _work_dir: &Path, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("commit_all {message}"));
        Ok(())
    }

    async fn push(&self, _remote_url: &str, _work_dir: &Path, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("push {branch}"));
        // Pushed branches become visible to later dedup checks.
        state.remote_branches.push(format!("origin/{branch}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StubCodeFix
// ---------------------------------------------------------------------------

struct StubCodeFixState {
    report: Option<String>,
    tasks: Vec<String>,
    last_allowed: Vec<FixOperation>,
}

/// [`CodeFix`] fake returning a canned report (or none).
#[derive(Clone)]
pub struct StubCodeFix {
    state: Arc<Mutex<StubCodeFixState>>,
}

impl StubCodeFix {
    /// Every apply call succeeds with `report`.
    pub fn reporting(report: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(StubCodeFixState {
                report: Some(report.to_string()),
                tasks: Vec::new(),
                last_allowed: Vec::new(),
            })),
        }
    }

    /// Every apply call produces no usable result.
    pub fn empty() -> Self {
        let stub = Self::reporting("");
        stub.state.lock().unwrap().report = None;
        stub
    }

    pub fn apply_calls(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }

    pub fn last_task(&self) -> Option<String> {
        self.state.lock().unwrap().tasks.last().cloned()
    }

    pub fn last_allowed(&self) -> Vec<FixOperation> {
        self.state.lock().unwrap().last_allowed.clone()
    }
}

#[async_trait]
impl CodeFix for StubCodeFix {
    async fn apply(
        &self,
        task: &str,
        _work_dir: &Path,
        allowed: &[FixOperation],
    ) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.tasks.push(task.to_string());
        state.last_allowed = allowed.to_vec();
        Ok(state.report.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingChangeHost
// ---------------------------------------------------------------------------

struct RecordingChangeHostState {
    created: Vec<(String, String, ChangeMetadata)>,
}

/// [`ChangeHost`] fake that numbers created changes sequentially.
#[derive(Clone)]
pub struct RecordingChangeHost {
    state: Arc<Mutex<RecordingChangeHostState>>,
}

impl RecordingChangeHost {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingChangeHostState {
                created: Vec::new(),
            })),
        }
    }

    /// `(branch, base, metadata)` triples, in creation order.
    pub fn created(&self) -> Vec<(String, String, ChangeMetadata)> {
        self.state.lock().unwrap().created.clone()
    }
}

impl Default for RecordingChangeHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeHost for RecordingChangeHost {
    async fn create_change(
        &self,
        branch: &str,
        base: &str,
        metadata: &ChangeMetadata,
    ) -> Result<ChangeId> {
        let mut state = self.state.lock().unwrap();
        state
            .created
            .push((branch.to_string(), base.to_string(), metadata.clone()));
        Ok(ChangeId(state.created.len().to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingRemediator
// ---------------------------------------------------------------------------

struct RecordingRemediatorState {
    errors_seen: Vec<FixableError>,
    failure: Option<String>,
}

/// [`Remediator`] fake that records every error handed to it.
#[derive(Clone)]
pub struct RecordingRemediator {
    state: Arc<Mutex<RecordingRemediatorState>>,
}

impl RecordingRemediator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingRemediatorState {
                errors_seen: Vec::new(),
                failure: None,
            })),
        }
    }

    /// Every remediate call fails with `RepoUnavailable`.
    pub fn repo_unavailable(detail: &str) -> Self {
        let fake = Self::new();
        fake.state.lock().unwrap().failure = Some(detail.to_string());
        fake
    }

    pub fn errors_seen(&self) -> Vec<FixableError> {
        self.state.lock().unwrap().errors_seen.clone()
    }
}

impl Default for RecordingRemediator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Remediator for RecordingRemediator {
    async fn remediate(&self, error: &FixableError) -> Result<RemediationOutcome> {
        let mut state = self.state.lock().unwrap();
        state.errors_seen.push(error.clone());
        match &state.failure {
            Some(detail) => Err(TriageError::RepoUnavailable(detail.clone())),
            None => Ok(RemediationOutcome {
                branch_name: format!("autofix/{}-test", error.fix_short_name),
                status: RemediationStatus::Proposed,
                change_id: Some(ChangeId("1".to_string())),
            }),
        }
    }
}
