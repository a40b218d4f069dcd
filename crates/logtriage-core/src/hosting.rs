//! GitHub-backed [`ChangeHost`]: opens pull requests for pushed fix branches.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::capabilities::ChangeHost;
use crate::domain::error::{Result, TriageError};
use crate::domain::model::{ChangeId, ChangeMetadata};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("logtriage/", env!("CARGO_PKG_VERSION"));

pub struct GithubChangeHost {
    client: reqwest::Client,
    repo: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct PullReply {
    number: u64,
    html_url: String,
}

impl GithubChangeHost {
    /// `repo` is the `owner/name` slug.
    pub fn new(repo: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            repo: repo.into(),
            token,
        }
    }
}

#[async_trait]
impl ChangeHost for GithubChangeHost {
    async fn create_change(
        &self,
        branch: &str,
        base: &str,
        metadata: &ChangeMetadata,
    ) -> Result<ChangeId> {
        let url = format!("{API_BASE}/repos/{}/pulls", self.repo);
        let mut builder = self
            .client
            .post(&url)
            .header("user-agent", USER_AGENT)
            .header("accept", "application/vnd.github+json")
            .json(&json!({
                "title": metadata.title,
                "body": metadata.description,
                "head": branch,
                "base": base,
            }));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TriageError::NetworkFailure(format!("create change: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TriageError::AuthFailure(format!(
                "change host rejected credentials: {status}"
            )));
        }
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let detail = response.text().await.unwrap_or_default();
            if detail.contains("base") {
                return Err(TriageError::BaseBranchMissing(format!(
                    "base branch {base} rejected: {detail}"
                )));
            }
            return Err(TriageError::NetworkFailure(format!(
                "create change rejected: {detail}"
            )));
        }
        if !status.is_success() {
            return Err(TriageError::NetworkFailure(format!(
                "create change returned {status}"
            )));
        }

        let reply: PullReply = response
            .json()
            .await
            .map_err(|e| TriageError::NetworkFailure(format!("create change reply: {e}")))?;
        info!(number = reply.number, url = %reply.html_url, "pull request opened");
        Ok(ChangeId(reply.number.to_string()))
    }
}
