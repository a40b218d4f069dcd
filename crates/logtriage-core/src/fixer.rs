//! [`CodeFix`] implementation shelling out to an agentic coding CLI.
//!
//! The subprocess runs non-interactively inside the working copy, restricted
//! to the operations the orchestrator granted it.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::capabilities::{CodeFix, FixOperation};
use crate::domain::error::Result;

/// Runs a coding-agent command (for example `claude`) as the fix capability.
pub struct CommandCodeFix {
    command: String,
}

impl CommandCodeFix {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl CodeFix for CommandCodeFix {
    async fn apply(
        &self,
        task: &str,
        work_dir: &Path,
        allowed: &[FixOperation],
    ) -> Result<Option<String>> {
        let tools: Vec<String> = allowed.iter().map(|op| op.to_string()).collect();
        info!(
            command = %self.command,
            allowed_tools = %tools.join(","),
            "running code fixer"
        );

        let spawned = tokio::process::Command::new(&self.command)
            .arg("--print")
            .arg(task)
            .arg("--allowed-tools")
            .arg(tools.join(","))
            .current_dir(work_dir)
            .output()
            .await;

        // A fixer that cannot even start is the same handled outcome as one
        // that produces nothing.
        let output = match spawned {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %self.command, error = %e, "code fixer could not be launched");
                return Ok(None);
            }
        };

        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "code fixer exited with failure"
            );
            return Ok(None);
        }

        let report = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if report.is_empty() {
            warn!("code fixer produced no report");
            return Ok(None);
        }
        Ok(Some(report))
    }
}
