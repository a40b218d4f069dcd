//! Remediation orchestrator tests over in-memory fakes: the happy path
//! through all six steps, the duplicate and fix-failure terminal states,
//! and the zero-write guarantees attached to each of them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use logtriage_core::capabilities::FixOperation;
use logtriage_core::fakes::{RecordingChangeHost, RecordingVcs, ScriptedModel, StubCodeFix};
use logtriage_core::{
    FixableError, RemediationConfig, RemediationOrchestrator, RemediationStatus, TriageError,
};

fn config(work_dir: PathBuf) -> RemediationConfig {
    RemediationConfig {
        repo: "acme/service".to_string(),
        token: Some("tok".to_string()),
        base_branch: "main".to_string(),
        work_dir,
        fix_command: "claude".to_string(),
    }
}

fn sample_error() -> FixableError {
    FixableError::new(
        "ZeroDivisionError in billing.py line 42",
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        "div-zero",
    )
    .unwrap()
}

fn orchestrator(
    work_dir: PathBuf,
    vcs: &RecordingVcs,
    fixer: &StubCodeFix,
    model: &ScriptedModel,
    host: &RecordingChangeHost,
) -> RemediationOrchestrator {
    RemediationOrchestrator::new(
        config(work_dir),
        Arc::new(vcs.clone()),
        Arc::new(fixer.clone()),
        Arc::new(model.clone()),
        Arc::new(host.clone()),
    )
}

#[tokio::test]
async fn test_full_flow_opens_proposed_change() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new().with_remote_branches(&["origin/main"]);
    let fixer = StubCodeFix::reporting("patched billing.py to guard the divisor");
    let model = ScriptedModel::answering("unused").with_change_metadata(
        "fix division by zero when the invoice total is empty and retries exhausted",
        "Guards the divisor in billing.py.",
    );
    let host = RecordingChangeHost::new();

    let orch = orchestrator(dir.path().to_path_buf(), &vcs, &fixer, &model, &host);
    let outcome = orch.remediate(&sample_error()).await.unwrap();

    assert_eq!(outcome.status, RemediationStatus::Proposed);
    assert_eq!(outcome.branch_name, "autofix/div-zero-20250115-120000");
    assert!(outcome.change_id.is_some());

    // Steps ran in order: acquire, dedup check, branch, commit, push.
    let calls = vcs.calls();
    assert_eq!(calls[0], "ensure_clone");
    assert_eq!(calls[1], "list_remote_branches");
    assert!(calls[2].starts_with("create_branch autofix/div-zero-"));
    assert!(calls[3].starts_with("commit_all"));
    assert!(calls[4].starts_with("push autofix/div-zero-"));

    // The fixer was granted read and edit only.
    assert_eq!(
        fixer.last_allowed(),
        vec![FixOperation::FileRead, FixOperation::FileEdit]
    );
    assert!(fixer.last_task().unwrap().contains("ZeroDivisionError"));

    // The change targets the default branch with a clamped title.
    let created = host.created();
    assert_eq!(created.len(), 1);
    let (branch, base, metadata) = &created[0];
    assert_eq!(branch, &outcome.branch_name);
    assert_eq!(base, "main");
    assert!(metadata.title.split_whitespace().count() <= 10);
}

#[tokio::test]
async fn test_existing_remote_branch_skips_without_writes() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new()
        .with_remote_branches(&["origin/main", "origin/autofix/div-zero-20250101-000000"]);
    let fixer = StubCodeFix::reporting("unused");
    let model = ScriptedModel::answering("unused");
    let host = RecordingChangeHost::new();

    let orch = orchestrator(dir.path().to_path_buf(), &vcs, &fixer, &model, &host);
    let outcome = orch.remediate(&sample_error()).await.unwrap();

    assert_eq!(outcome.status, RemediationStatus::SkippedDuplicate);
    assert!(outcome.change_id.is_none());
    assert_eq!(vcs.write_calls(), 0);
    assert_eq!(fixer.apply_calls(), 0);
    assert_eq!(model.metadata_calls(), 0);
    assert!(host.created().is_empty());
}

#[tokio::test]
async fn test_unrelated_branches_do_not_trigger_dedup() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new()
        .with_remote_branches(&["origin/main", "origin/autofix/auth-keyerror-20250101-000000"]);
    let fixer = StubCodeFix::reporting("patched");
    let model = ScriptedModel::answering("unused");
    let host = RecordingChangeHost::new();

    let orch = orchestrator(dir.path().to_path_buf(), &vcs, &fixer, &model, &host);
    let outcome = orch.remediate(&sample_error()).await.unwrap();

    assert_eq!(outcome.status, RemediationStatus::Proposed);
}

#[tokio::test]
async fn test_failed_fix_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new().with_remote_branches(&["origin/main"]);
    let fixer = StubCodeFix::empty();
    let model = ScriptedModel::answering("unused");
    let host = RecordingChangeHost::new();

    let orch = orchestrator(dir.path().to_path_buf(), &vcs, &fixer, &model, &host);
    let outcome = orch.remediate(&sample_error()).await.unwrap();

    assert_eq!(outcome.status, RemediationStatus::FixFailed);
    assert!(!outcome.completed());
    assert!(vcs.pushed_branches().is_empty());
    assert_eq!(model.metadata_calls(), 0);
    assert!(host.created().is_empty());
}

#[tokio::test]
async fn test_acquire_failure_propagates_as_repo_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new().failing_acquire("could not resolve host");
    let fixer = StubCodeFix::reporting("unused");
    let model = ScriptedModel::answering("unused");
    let host = RecordingChangeHost::new();

    let orch = orchestrator(dir.path().to_path_buf(), &vcs, &fixer, &model, &host);
    let err = orch.remediate(&sample_error()).await.unwrap_err();

    assert!(matches!(err, TriageError::RepoUnavailable(_)));
    assert_eq!(vcs.write_calls(), 0);
    assert_eq!(fixer.apply_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_remediations_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new().with_remote_branches(&["origin/main"]);
    let fixer = StubCodeFix::reporting("patched");
    let model = ScriptedModel::answering("unused");
    let host = RecordingChangeHost::new();

    let orch = Arc::new(orchestrator(
        dir.path().to_path_buf(),
        &vcs,
        &fixer,
        &model,
        &host,
    ));
    let other = FixableError::new(
        "KeyError 'user' in auth.py",
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        "auth-keyerror",
    )
    .unwrap();

    let (a, b) = (Arc::clone(&orch), Arc::clone(&orch));
    let first_error = sample_error();
    let (first, second) = tokio::join!(
        async move { a.remediate(&first_error).await },
        async move { b.remediate(&other).await },
    );
    assert_eq!(first.unwrap().status, RemediationStatus::Proposed);
    assert_eq!(second.unwrap().status, RemediationStatus::Proposed);

    // The working copy is one mutable resource: each attempt's VCS calls
    // must form a contiguous block, never interleaving with the other's.
    let calls = vcs.calls();
    assert_eq!(calls.len(), 10);
    for block in calls.chunks(5) {
        assert_eq!(block[0], "ensure_clone");
        assert_eq!(block[1], "list_remote_branches");
        let branch = block[2].strip_prefix("create_branch ").unwrap();
        assert!(block[3].starts_with("commit_all"));
        assert_eq!(block[4], format!("push {branch}"));
    }
    assert_eq!(host.created().len(), 2);
}

#[tokio::test]
async fn test_second_attempt_for_same_fix_is_deduplicated_by_pushed_branch() {
    let dir = tempfile::tempdir().unwrap();
    let vcs = RecordingVcs::new().with_remote_branches(&["origin/main"]);
    let fixer = StubCodeFix::reporting("patched");
    let model = ScriptedModel::answering("unused");
    let host = RecordingChangeHost::new();

    let orch = orchestrator(dir.path().to_path_buf(), &vcs, &fixer, &model, &host);

    let first = orch.remediate(&sample_error()).await.unwrap();
    assert_eq!(first.status, RemediationStatus::Proposed);

    // A later sighting of the same error, at a different time, finds the
    // pushed branch and becomes a no-op.
    let later = FixableError::new(
        "ZeroDivisionError in billing.py line 42",
        Utc.with_ymd_and_hms(2025, 1, 16, 9, 30, 0).unwrap(),
        "div-zero",
    )
    .unwrap();
    let second = orch.remediate(&later).await.unwrap();

    assert_eq!(second.status, RemediationStatus::SkippedDuplicate);
    assert_eq!(host.created().len(), 1);
    assert_eq!(fixer.apply_calls(), 1);
}
