//! Remediation orchestrator: turns one fixable error into a proposed change.
//!
//! A six-step sequential state machine; each step's failure short-circuits
//! the rest. Invocations are serialized internally because the on-disk
//! working copy is a single mutable resource.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::capabilities::{AnalysisModel, ChangeHost, CodeFix, FixOperation, Remediator, VersionControl};
use crate::config::RemediationConfig;
use crate::domain::error::{Result, TriageError};
use crate::domain::model::{FixableError, RemediationOutcome, RemediationStatus};

/// Branch namespace for automated fixes; also the dedup key prefix.
const BRANCH_PREFIX: &str = "autofix";

/// Operations granted to the code-fix capability. Never widened: no file
/// creation, no command execution.
const ALLOWED_FIX_OPS: [FixOperation; 2] = [FixOperation::FileRead, FixOperation::FileEdit];

pub struct RemediationOrchestrator {
    cfg: RemediationConfig,
    vcs: Arc<dyn VersionControl>,
    fixer: Arc<dyn CodeFix>,
    model: Arc<dyn AnalysisModel>,
    host: Arc<dyn ChangeHost>,
    /// Serializes invocations over the shared working copy.
    work_copy: tokio::sync::Mutex<()>,
}

impl RemediationOrchestrator {
    pub fn new(
        cfg: RemediationConfig,
        vcs: Arc<dyn VersionControl>,
        fixer: Arc<dyn CodeFix>,
        model: Arc<dyn AnalysisModel>,
        host: Arc<dyn ChangeHost>,
    ) -> Self {
        Self {
            cfg,
            vcs,
            fixer,
            model,
            host,
            work_copy: tokio::sync::Mutex::new(()),
        }
    }

    /// Deterministic branch name for one sighting of an error.
    fn branch_name(error: &FixableError) -> String {
        format!(
            "{BRANCH_PREFIX}/{}-{}",
            error.fix_short_name,
            error.timestamp.format("%Y%m%d-%H%M%S")
        )
    }

    /// Prefix shared by every branch created for this `fix_short_name`.
    fn dedup_prefix(error: &FixableError) -> String {
        format!("{BRANCH_PREFIX}/{}-", error.fix_short_name)
    }

    /// Drive one fixable error through the full state machine.
    ///
    /// Returns `Ok` with a terminal [`RemediationOutcome`] for the handled
    /// outcomes (duplicate skip, fix failure, proposed change). A step-1
    /// failure propagates as `Err(RepoUnavailable)` because the orchestrator
    /// cannot safely proceed at all.
    pub async fn remediate(&self, error: &FixableError) -> Result<RemediationOutcome> {
        let _guard = self.work_copy.lock().await;

        let branch_name = Self::branch_name(error);
        info!(
            fix_short_name = %error.fix_short_name,
            branch = %branch_name,
            "starting remediation"
        );

        // Step 1: acquire working copy. Any failure here is fatal to the
        // attempt and is raised, not returned as an outcome.
        let remote_url = self.cfg.remote_url();
        let work_dir = self.cfg.work_dir.as_path();
        self.acquire_working_copy(&remote_url).await?;

        // Step 2: deduplicate against the remote branch list. The remote
        // list is the only durable dedup state. Read-then-push is racy if
        // two orchestrators ever run concurrently; invocations within this
        // process are serialized by `work_copy`.
        let prefix = Self::dedup_prefix(error);
        let remote_branches = self.vcs.list_remote_branches(work_dir).await?;
        let duplicate = remote_branches
            .iter()
            .any(|b| b.trim_start_matches("origin/").starts_with(&prefix));
        if duplicate {
            info!(branch = %branch_name, "remote branch for this fix already exists; skipping");
            return Ok(RemediationOutcome {
                branch_name,
                status: RemediationStatus::SkippedDuplicate,
                change_id: None,
            });
        }
        self.vcs.create_branch(work_dir, &branch_name).await?;

        // Step 3: bounded fix capability, read-and-edit only.
        let task = format!("Fix this error in the codebase: {}", error.message);
        let report = match self.fixer.apply(&task, work_dir, &ALLOWED_FIX_OPS).await? {
            Some(report) => report,
            None => {
                warn!(branch = %branch_name, "fix capability produced no usable result");
                return Ok(RemediationOutcome {
                    branch_name,
                    status: RemediationStatus::FixFailed,
                    change_id: None,
                });
            }
        };

        // Step 4: change metadata from the fix report, summary tier.
        let metadata = self.model.change_metadata(&report).await?.clamp_title(10);

        // Step 5: commit and publish.
        self.vcs.commit_all(work_dir, &metadata.title).await?;
        self.vcs.push(&remote_url, work_dir, &branch_name).await?;

        // Step 6: open the proposed change against the default branch.
        let change_id = self
            .host
            .create_change(&branch_name, &self.cfg.base_branch, &metadata)
            .await?;

        info!(
            branch = %branch_name,
            change_id = %change_id,
            title = %metadata.title,
            "proposed change opened"
        );

        Ok(RemediationOutcome {
            branch_name,
            status: RemediationStatus::Proposed,
            change_id: Some(change_id),
        })
    }

    async fn acquire_working_copy(&self, remote_url: &str) -> Result<()> {
        let work_dir = self.cfg.work_dir.as_path();
        let acquired = async {
            if work_dir.join(".git").exists() {
                self.vcs.pull(remote_url, work_dir).await
            } else {
                self.vcs.ensure_clone(remote_url, work_dir).await
            }
        }
        .await;

        acquired.map_err(|e| match e {
            TriageError::AuthFailure(d) | TriageError::NetworkFailure(d) => {
                TriageError::RepoUnavailable(d)
            }
            other => other,
        })
    }
}

#[async_trait]
impl Remediator for RemediationOrchestrator {
    async fn remediate(&self, error: &FixableError) -> Result<RemediationOutcome> {
        RemediationOrchestrator::remediate(self, error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_error() -> FixableError {
        FixableError::new(
            "ZeroDivisionError in billing.py line 42",
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            "div-zero",
        )
        .unwrap()
    }

    #[test]
    fn test_branch_name_is_deterministic() {
        let error = sample_error();
        assert_eq!(
            RemediationOrchestrator::branch_name(&error),
            "autofix/div-zero-20250115-120000"
        );
    }

    #[test]
    fn test_dedup_prefix_matches_branch_name() {
        let error = sample_error();
        let branch = RemediationOrchestrator::branch_name(&error);
        let prefix = RemediationOrchestrator::dedup_prefix(&error);
        assert!(branch.starts_with(&prefix));
    }
}
