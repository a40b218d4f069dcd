//! Analysis engine: per-chunk workers and the single-chunk triage pass.
//!
//! Workers only observe and summarize. The triage pass additionally drives
//! the remediation handle for errors that met the registration criteria,
//! at most once per error signature per run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{error, info, warn};

use crate::capabilities::{AnalysisModel, ModelRequest, ModelTier, Remediator};
use crate::domain::error::{Result, TriageError};
use crate::domain::model::{Finding, LogChunk, TimeRange};
use crate::prompts;

/// Global context shared by every analysis call of one request.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub log_group: String,
    pub range: TimeRange,
    pub total_records: usize,
}

/// Output of one worker, degraded rather than absent when the call failed.
#[derive(Debug, Clone)]
pub struct ChunkFinding {
    pub index: usize,
    pub time_range: String,
    pub chunk_size: usize,
    pub summary: String,
    /// Error marker when the analysis call failed; the synthesis stage must
    /// account for it visibly.
    pub failure: Option<String>,
    pub elapsed_secs: f64,
}

impl ChunkFinding {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Analyze one chunk with a worker model call.
///
/// A failed call never propagates: it degrades to an empty finding tagged
/// with the error text, so sibling chunks are unaffected.
pub async fn analyze_chunk(
    model: &Arc<dyn AnalysisModel>,
    chunk: &LogChunk,
    question: &str,
    ctx: &RunContext,
) -> ChunkFinding {
    let started = Instant::now();
    let time_range = chunk.time_range_description();

    let request = match worker_request(chunk, question, ctx) {
        Ok(req) => req,
        Err(e) => {
            return degraded(chunk, &time_range, e.to_string(), started);
        }
    };

    match model.analyze(request).await {
        Ok(reply) => {
            info!(
                chunk = chunk.index + 1,
                total = chunk.total,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "chunk analysis complete"
            );
            ChunkFinding {
                index: chunk.index,
                time_range,
                chunk_size: chunk.len(),
                summary: reply.summary,
                failure: None,
                elapsed_secs: started.elapsed().as_secs_f64(),
            }
        }
        Err(e) => {
            error!(
                chunk = chunk.index + 1,
                total = chunk.total,
                error = %e,
                "chunk analysis failed"
            );
            degraded(chunk, &time_range, e.to_string(), started)
        }
    }
}

fn degraded(chunk: &LogChunk, time_range: &str, failure: String, started: Instant) -> ChunkFinding {
    ChunkFinding {
        index: chunk.index,
        time_range: time_range.to_string(),
        chunk_size: chunk.len(),
        summary: String::new(),
        failure: Some(failure),
        elapsed_secs: started.elapsed().as_secs_f64(),
    }
}

fn worker_request(chunk: &LogChunk, question: &str, ctx: &RunContext) -> Result<ModelRequest> {
    let system_prompt = prompts::worker_prompt(
        chunk.index,
        chunk.total,
        chunk.len(),
        &chunk.time_range_description(),
        question,
    );

    let context = json!({
        "metadata": {
            "log_group": ctx.log_group,
            "chunk_index": chunk.index + 1,
            "total_chunks": chunk.total,
            "chunk_time_range": chunk.time_range_description(),
            "chunk_size": chunk.len(),
            "global_time_range": ctx.range.describe(),
            "total_records_in_dataset": ctx.total_records,
        },
        "logs": chunk.records,
    });
    let context_json = serde_json::to_string(&context)?;
    log_payload_size(chunk.index + 1, chunk.total, &context_json);

    Ok(ModelRequest {
        system_prompt,
        parts: vec![
            format!("Question: {question}"),
            format!("Log context: {context_json}"),
            "Analyze this chunk of logs according to the guidelines in your system prompt."
                .to_string(),
        ],
        tier: ModelTier::Reasoning,
    })
}

fn log_payload_size(chunk: usize, total: usize, payload: &str) {
    let bytes = payload.len();
    info!(
        chunk,
        total,
        payload_bytes = bytes,
        payload_kb = format!("{:.2}", bytes as f64 / 1024.0),
        "model payload prepared"
    );
}

/// Single-chunk triage: analysis, synthesis and remediation decisions in one
/// pass over the full record set.
///
/// Each qualifying error is handed to `remediator` at most once per run,
/// keyed by `fix_short_name`, regardless of how often it recurs in the
/// model's reply. Remediation failures are logged and contained; they never
/// abort the analysis run.
pub async fn run_triage(
    model: &Arc<dyn AnalysisModel>,
    remediator: &Arc<dyn Remediator>,
    chunk: &LogChunk,
    question: &str,
    ctx: &RunContext,
) -> Result<Finding> {
    let context = json!({
        "metadata": {
            "log_group": ctx.log_group,
            "period": ctx.range.describe(),
            "total_records": ctx.total_records,
        },
        "logs": chunk.records,
    });
    let context_json = serde_json::to_string(&context)?;
    log_payload_size(1, 1, &context_json);

    let reply = model
        .analyze(ModelRequest {
            system_prompt: prompts::TRIAGE_PROMPT.to_string(),
            parts: vec![
                format!("Question: {question}"),
                format!("Log context: {context_json}"),
                "Answer the question based on the log data provided.".to_string(),
            ],
            tier: ModelTier::Reasoning,
        })
        .await?;

    let mut registered: HashSet<String> = HashSet::new();
    for fixable in &reply.fixable_errors {
        if !registered.insert(fixable.fix_short_name.clone()) {
            info!(
                fix_short_name = %fixable.fix_short_name,
                "error already registered this run; skipping"
            );
            continue;
        }

        match remediator.remediate(fixable).await {
            Ok(outcome) => {
                info!(
                    fix_short_name = %fixable.fix_short_name,
                    branch = %outcome.branch_name,
                    status = ?outcome.status,
                    completed = outcome.completed(),
                    "remediation attempt finished"
                );
            }
            // Step-1 failures abort that single attempt only.
            Err(TriageError::RepoUnavailable(detail)) => {
                warn!(
                    fix_short_name = %fixable.fix_short_name,
                    error = %detail,
                    "remediation aborted: repository unavailable"
                );
            }
            Err(e) => {
                warn!(
                    fix_short_name = %fixable.fix_short_name,
                    error = %e,
                    "remediation attempt failed"
                );
            }
        }
    }

    Ok(Finding {
        summary: reply.summary,
        fixable_errors: reply.fixable_errors,
    })
}
