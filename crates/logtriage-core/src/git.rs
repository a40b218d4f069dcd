//! Git-backed [`VersionControl`] implementation.
//!
//! Shells out to the `git` binary. The authenticated remote URL may embed a
//! token, so it is redacted from every error detail and never logged.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::capabilities::VersionControl;
use crate::domain::error::{Result, TriageError};

/// Commit author identity used for automated fix commits.
const COMMIT_AUTHOR: &str = "logtriage";
const COMMIT_EMAIL: &str = "logtriage@localhost";

/// [`VersionControl`] backed by the system `git` binary.
#[derive(Debug, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, dir: Option<&Path>, args: &[&str], redact: Option<&str>) -> Result<String> {
        let mut cmd = tokio::process::Command::new("git");
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| TriageError::NetworkFailure(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if let Some(secret) = redact {
                stderr = stderr.replace(secret, "<remote>");
            }
            return Err(classify_git_failure(args[0], &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn classify_git_failure(subcommand: &str, stderr: &str) -> TriageError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("authentication failed")
        || lowered.contains("invalid username or password")
        || lowered.contains("403")
        || lowered.contains("401")
    {
        TriageError::AuthFailure(format!("git {subcommand}: {}", stderr.trim()))
    } else {
        TriageError::NetworkFailure(format!("git {subcommand}: {}", stderr.trim()))
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn ensure_clone(&self, remote_url: &str, work_dir: &Path) -> Result<()> {
        if work_dir.join(".git").exists() {
            debug!(work_dir = %work_dir.display(), "working copy already present");
            return Ok(());
        }
        if let Some(parent) = work_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dest = work_dir.to_string_lossy();
        info!(work_dir = %work_dir.display(), "cloning repository");
        self.run(None, &["clone", remote_url, &dest], Some(remote_url))
            .await?;
        Ok(())
    }

    async fn pull(&self, remote_url: &str, work_dir: &Path) -> Result<()> {
        // Land on the remote's default state before branching off it.
        self.run(
            Some(work_dir),
            &["fetch", "--prune", remote_url],
            Some(remote_url),
        )
        .await?;
        self.run(
            Some(work_dir),
            &["pull", "--ff-only", remote_url],
            Some(remote_url),
        )
        .await?;
        Ok(())
    }

    async fn list_remote_branches(&self, work_dir: &Path) -> Result<Vec<String>> {
        let stdout = self
            .run(
                Some(work_dir),
                &["branch", "-r", "--format=%(refname:short)"],
                None,
            )
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn create_branch(&self, work_dir: &Path, branch: &str) -> Result<()> {
        self.run(Some(work_dir), &["checkout", "-b", branch], None)
            .await?;
        Ok(())
    }

    async fn commit_all(&self, work_dir: &Path, message: &str) -> Result<()> {
        self.run(Some(work_dir), &["add", "-A"], None).await?;
        self.run(
            Some(work_dir),
            &[
                "-c",
                &format!("user.name={COMMIT_AUTHOR}"),
                "-c",
                &format!("user.email={COMMIT_EMAIL}"),
                "commit",
                "-m",
                message,
            ],
            None,
        )
        .await?;
        Ok(())
    }

    async fn push(&self, remote_url: &str, work_dir: &Path, branch: &str) -> Result<()> {
        info!(branch, "pushing fix branch");
        self.run(
            Some(work_dir),
            &["push", remote_url, &format!("HEAD:{branch}")],
            Some(remote_url),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "--initial-branch=main"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[tokio::test]
    async fn test_create_branch_and_commit() {
        let repo = make_git_repo();
        let git = GitCli::new();

        git.create_branch(repo.path(), "autofix/test-1").await.unwrap();
        std::fs::write(repo.path().join("f.txt"), "x").unwrap();
        git.commit_all(repo.path(), "fix something").await.unwrap();

        let head = StdCommand::new("git")
            .args(["log", "-1", "--format=%s"])
            .current_dir(repo.path())
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&head.stdout).trim(), "fix something");
    }

    #[tokio::test]
    async fn test_ensure_clone_is_idempotent_on_existing_copy() {
        let repo = make_git_repo();
        let git = GitCli::new();
        // An existing .git short-circuits before touching the remote.
        git.ensure_clone("https://invalid.example/none.git", repo.path())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_remote_branches_empty_without_remote() {
        let repo = make_git_repo();
        let git = GitCli::new();
        let branches = git.list_remote_branches(repo.path()).await.unwrap();
        assert!(branches.is_empty());
    }

    #[test]
    fn test_auth_failures_are_classified() {
        let err = classify_git_failure("push", "fatal: Authentication failed for <remote>");
        assert!(matches!(err, TriageError::AuthFailure(_)));

        let err = classify_git_failure("pull", "fatal: unable to access: could not resolve host");
        assert!(matches!(err, TriageError::NetworkFailure(_)));
    }
}
