//! Synthesis engine: reconciles ordered worker findings into one answer.
//!
//! This stage only summarizes. It has no remediation handle and never
//! registers fixes.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::analysis::{ChunkFinding, RunContext};
use crate::capabilities::{AnalysisModel, ModelRequest, ModelTier};
use crate::domain::error::Result;
use crate::domain::model::Finding;
use crate::prompts;

/// Synthesize per-chunk findings into a final [`Finding`].
///
/// Findings are consumed in chunk order, so chunk 0's content logically
/// precedes chunk 1's. Failed chunks are always surfaced in the final text;
/// when every chunk failed the summary is produced deterministically without
/// a model call.
pub async fn synthesize(
    model: &Arc<dyn AnalysisModel>,
    findings: &[ChunkFinding],
    question: &str,
    ctx: &RunContext,
) -> Result<Finding> {
    let mut ordered: Vec<&ChunkFinding> = findings.iter().collect();
    ordered.sort_by_key(|f| f.index);

    let succeeded: Vec<&ChunkFinding> = ordered.iter().copied().filter(|f| f.succeeded()).collect();
    let failed: Vec<&ChunkFinding> = ordered.iter().copied().filter(|f| !f.succeeded()).collect();

    if succeeded.is_empty() {
        let mut summary = String::from("ERROR: all chunks failed to process.\n\nFailures:\n");
        for f in &failed {
            summary.push_str(&format!(
                "- Chunk {}: {}\n",
                f.index + 1,
                f.failure.as_deref().unwrap_or("unknown error")
            ));
        }
        return Ok(Finding::text(summary.trim_end()));
    }

    let system_prompt = prompts::coordinator_prompt(
        succeeded.len(),
        ordered.len(),
        ctx.total_records,
        &ctx.range.describe(),
    );

    let mut context = json!({
        "metadata": {
            "log_group": ctx.log_group,
            "time_range": ctx.range.describe(),
            "total_records": ctx.total_records,
            "total_chunks": ordered.len(),
            "successful_chunks": succeeded.len(),
            "failed_chunks": failed.len(),
        },
        "chunk_analyses": succeeded.iter().map(|f| json!({
            "chunk_index": f.index + 1,
            "time_range": f.time_range,
            "size": f.chunk_size,
            "analysis": f.summary,
            "processing_time": format!("{:.2}s", f.elapsed_secs),
        })).collect::<Vec<_>>(),
    });
    if !failed.is_empty() {
        context["failed_chunks"] = json!(failed
            .iter()
            .map(|f| json!({
                "chunk_index": f.index + 1,
                "error": f.failure,
            }))
            .collect::<Vec<_>>());
    }

    let context_json = serde_json::to_string(&context)?;
    info!(
        payload_bytes = context_json.len(),
        chunks = ordered.len(),
        "coordinator synthesis starting"
    );

    let reply = model
        .analyze(ModelRequest {
            system_prompt,
            parts: vec![
                format!("Original Question: {question}"),
                format!("Chunk Analyses: {context_json}"),
                "Synthesize these chunk analyses to answer the user's question.".to_string(),
            ],
            tier: ModelTier::Reasoning,
        })
        .await?;

    // Hard guarantee, independent of the model following its prompt: a
    // partial analysis never reads as full coverage.
    let mut summary = reply.summary;
    if !failed.is_empty() {
        summary.push_str("\n\nLimitations: analysis is incomplete;");
        for f in &failed {
            summary.push_str(&format!(
                " chunk {} ({}) failed: {};",
                f.index + 1,
                f.time_range,
                f.failure.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    Ok(Finding::text(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TimeRange;
    use crate::fakes::ScriptedModel;
    use chrono::{Duration, TimeZone, Utc};

    fn ctx() -> RunContext {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        RunContext {
            log_group: "app".to_string(),
            range: TimeRange::new(start, start + Duration::hours(1)).unwrap(),
            total_records: 25,
        }
    }

    fn finding(index: usize, summary: &str, failure: Option<&str>) -> ChunkFinding {
        ChunkFinding {
            index,
            time_range: format!("t{index} to t{}", index + 1),
            chunk_size: 10,
            summary: summary.to_string(),
            failure: failure.map(str::to_string),
            elapsed_secs: 0.1,
        }
    }

    #[tokio::test]
    async fn test_all_failed_short_circuits_without_model_call() {
        let model = ScriptedModel::answering("unused");
        let model_dyn: Arc<dyn AnalysisModel> = Arc::new(model.clone());

        let findings = vec![
            finding(0, "", Some("timeout")),
            finding(1, "", Some("timeout")),
        ];
        let final_finding = synthesize(&model_dyn, &findings, "q", &ctx()).await.unwrap();

        assert!(final_finding.summary.contains("all chunks failed"));
        assert!(final_finding.summary.contains("Chunk 1: timeout"));
        assert_eq!(model.analyze_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_flagged_in_final_answer() {
        let model = ScriptedModel::answering("things look fine overall");
        let model_dyn: Arc<dyn AnalysisModel> = Arc::new(model.clone());

        let findings = vec![
            finding(0, "no errors in segment", None),
            finding(1, "", Some("model timeout")),
            finding(2, "a few retries", None),
        ];
        let final_finding = synthesize(&model_dyn, &findings, "q", &ctx()).await.unwrap();

        assert!(final_finding.summary.contains("things look fine overall"));
        assert!(final_finding.summary.contains("chunk 2"));
        assert!(final_finding.summary.contains("model timeout"));
    }

    #[tokio::test]
    async fn test_synthesis_consumes_findings_in_chunk_order() {
        let model = ScriptedModel::answering("combined");
        let model_dyn: Arc<dyn AnalysisModel> = Arc::new(model.clone());

        // Deliberately out of order, as completion order would be.
        let findings = vec![
            finding(2, "late segment", None),
            finding(0, "early segment", None),
            finding(1, "middle segment", None),
        ];
        synthesize(&model_dyn, &findings, "q", &ctx()).await.unwrap();

        let request = model.last_analyze_request().unwrap();
        let payload = request.parts.join("\n");
        let early = payload.find("early segment").unwrap();
        let middle = payload.find("middle segment").unwrap();
        let late = payload.find("late segment").unwrap();
        assert!(early < middle && middle < late);
    }
}
