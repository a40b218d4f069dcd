//! HTTP-backed [`AnalysisModel`] speaking the Anthropic messages API.
//!
//! Replies are requested as JSON objects; anything that does not parse into
//! the expected schema is a `ResponseMalformed` error, never a panic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::capabilities::{AnalysisModel, AnalysisReply, ModelRequest, ModelTier};
use crate::config::ModelConfig;
use crate::domain::error::{Result, TriageError};
use crate::domain::model::{ChangeMetadata, FixableError};
use crate::prompts;

const API_VERSION: &str = "2023-06-01";

pub struct HttpAnalysisModel {
    client: reqwest::Client,
    cfg: ModelConfig,
}

#[derive(Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Wire schema of an analysis reply before validation.
#[derive(Debug, Deserialize)]
struct WireAnalysisReply {
    summary: String,
    #[serde(default)]
    fixable_errors: Vec<WireFixableError>,
}

#[derive(Debug, Deserialize)]
struct WireFixableError {
    message: String,
    timestamp: String,
    fix_short_name: String,
}

impl HttpAnalysisModel {
    pub fn new(cfg: ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cfg,
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Reasoning => &self.cfg.reasoning_model,
            ModelTier::Summary => &self.cfg.summary_model,
        }
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String> {
        let model = self.model_for(request.tier);
        let body = json!({
            "model": model,
            "max_tokens": self.cfg.max_tokens,
            "system": request.system_prompt,
            "messages": [{
                "role": "user",
                "content": request.parts.join("\n\n"),
            }],
        });

        let mut builder = self
            .client
            .post(&self.cfg.endpoint)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        if let Some(key) = &self.cfg.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TriageError::ModelUnavailable(format!("model request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TriageError::ModelUnavailable(format!(
                "model returned {status}: {detail}"
            )));
        }

        let reply: MessagesReply = response
            .json()
            .await
            .map_err(|e| TriageError::ModelUnavailable(format!("model reply body: {e}")))?;

        let text: String = reply
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(TriageError::ResponseMalformed(
                "model reply contained no text".to_string(),
            ));
        }

        debug!(model, reply_bytes = text.len(), "model call complete");
        Ok(text)
    }
}

/// Strip an optional markdown code fence around a JSON reply.
fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn parse_reply<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(unfence(text))
        .map_err(|e| TriageError::ResponseMalformed(format!("{e}; reply was: {}", text.trim())))
}

fn validate_fixable(wire: WireFixableError) -> Result<FixableError> {
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&wire.timestamp)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            TriageError::ResponseMalformed(format!(
                "fixable error timestamp is not RFC3339: {}",
                wire.timestamp
            ))
        })?;
    FixableError::new(wire.message, timestamp, wire.fix_short_name)
        .map_err(|e| TriageError::ResponseMalformed(e.to_string()))
}

#[async_trait]
impl AnalysisModel for HttpAnalysisModel {
    async fn analyze(&self, request: ModelRequest) -> Result<AnalysisReply> {
        let text = self.complete(&request).await?;
        let wire: WireAnalysisReply = parse_reply(&text)?;

        let fixable_errors = wire
            .fixable_errors
            .into_iter()
            .map(validate_fixable)
            .collect::<Result<Vec<_>>>()?;
        if !fixable_errors.is_empty() {
            info!(
                fixable_errors = fixable_errors.len(),
                "model registered errors for remediation"
            );
        }

        Ok(AnalysisReply {
            summary: wire.summary,
            fixable_errors,
        })
    }

    async fn change_metadata(&self, fix_report: &str) -> Result<ChangeMetadata> {
        let text = self
            .complete(&ModelRequest {
                system_prompt: prompts::CHANGE_METADATA_PROMPT.to_string(),
                parts: vec![format!("Fix report:\n{fix_report}")],
                tier: ModelTier::Summary,
            })
            .await?;
        parse_reply(&text)
    }
}
