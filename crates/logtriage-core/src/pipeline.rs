//! End-to-end question pipeline: fetch, chunk, analyze, synthesize.
//!
//! Small record sets take the single-pass triage route, which is the only
//! place remediation can be initiated. Larger sets fan out to parallel
//! chunk workers whose findings are synthesized into one answer.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::analysis::{self, ChunkFinding, RunContext};
use crate::capabilities::{AnalysisModel, RecordStore, Remediator};
use crate::chunking::ChunkPlan;
use crate::config::AnalysisLimits;
use crate::domain::error::Result;
use crate::domain::model::{Finding, TimeRange};
use crate::synthesis;

/// Answer returned when the store has nothing in the requested range.
pub const EMPTY_RESULT_MESSAGE: &str = "No log records found to analyze.";

/// One question over one log group and time range.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub log_group: String,
    pub question: String,
    /// Record-store query; callers usually pass [`crate::config::DEFAULT_QUERY`].
    pub query: String,
    pub range: TimeRange,
}

/// Run accounting reported alongside the final answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunMetrics {
    pub total_records: usize,
    pub records_analyzed: usize,
    pub dropped_records: usize,
    pub chunks: usize,
    pub elapsed_secs: f64,
}

impl RunMetrics {
    /// The one-line trailer appended to CLI output.
    pub fn summary_line(&self) -> String {
        format!(
            "[Metadata: {} records, {} chunks, {:.2}s]",
            self.total_records, self.chunks, self.elapsed_secs
        )
    }
}

/// Final answer plus run accounting.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub finding: Finding,
    pub metrics: RunMetrics,
}

/// The log-question pipeline with its injected capabilities.
pub struct AskPipeline {
    store: Arc<dyn RecordStore>,
    model: Arc<dyn AnalysisModel>,
    remediator: Arc<dyn Remediator>,
    limits: AnalysisLimits,
}

impl AskPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        model: Arc<dyn AnalysisModel>,
        remediator: Arc<dyn Remediator>,
        limits: AnalysisLimits,
    ) -> Self {
        Self {
            store,
            model,
            remediator,
            limits,
        }
    }

    /// Answer one question over the records in `request.range`.
    #[instrument(skip(self, request), fields(log_group = %request.log_group))]
    pub async fn ask(&self, request: AskRequest) -> Result<AskOutcome> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();

        let records = self.store.fetch(&request.query, &request.range).await?;
        let total_records = records.len();
        info!(
            run_id = %run_id,
            total_records,
            range = %request.range,
            "records fetched"
        );

        if records.is_empty() {
            return Ok(AskOutcome {
                finding: Finding::text(EMPTY_RESULT_MESSAGE),
                metrics: RunMetrics {
                    total_records: 0,
                    records_analyzed: 0,
                    dropped_records: 0,
                    chunks: 0,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                },
            });
        }

        let plan = ChunkPlan::build(records, self.limits.chunk_size, self.limits.max_chunks);
        let ctx = RunContext {
            log_group: request.log_group.clone(),
            range: request.range,
            total_records,
        };

        let mut finding = if plan.is_triage() {
            analysis::run_triage(
                &self.model,
                &self.remediator,
                &plan.chunks[0],
                &request.question,
                &ctx,
            )
            .await?
        } else {
            let findings = self.run_workers(&plan, &request.question, &ctx).await;
            synthesis::synthesize(&self.model, &findings, &request.question, &ctx).await?
        };

        let metrics = RunMetrics {
            total_records,
            records_analyzed: plan.records_analyzed(),
            dropped_records: plan.dropped_records,
            chunks: plan.chunks.len(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        };

        if metrics.dropped_records > 0 {
            finding.summary.push_str(&format!(
                "\n\nNote: {} of {} records exceeded the analysis budget and were not examined.",
                metrics.dropped_records, metrics.total_records
            ));
        }

        info!(
            chunks = metrics.chunks,
            records_analyzed = metrics.records_analyzed,
            dropped_records = metrics.dropped_records,
            elapsed_secs = metrics.elapsed_secs,
            "question answered"
        );

        Ok(AskOutcome { finding, metrics })
    }

    /// Fan out one worker task per chunk, bounded by `max_workers`.
    ///
    /// Always returns one finding per chunk: worker failures (including task
    /// panics) degrade to failed findings instead of aborting siblings.
    async fn run_workers(&self, plan: &ChunkPlan, question: &str, ctx: &RunContext) -> Vec<ChunkFinding> {
        let sem = Arc::new(tokio::sync::Semaphore::new(self.limits.max_workers));
        let results: Arc<Mutex<Vec<ChunkFinding>>> = Arc::new(Mutex::new(Vec::new()));

        let mut tasks = Vec::with_capacity(plan.chunks.len());
        for chunk in &plan.chunks {
            let sem = Arc::clone(&sem);
            let results = Arc::clone(&results);
            let model = Arc::clone(&self.model);
            let chunk = chunk.clone();
            let question = question.to_string();
            let ctx = ctx.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                let finding = analysis::analyze_chunk(&model, &chunk, &question, &ctx).await;
                results.lock().await.push(finding);
            }));
        }

        let joined = futures::future::join_all(tasks).await;
        for (i, joined) in joined.into_iter().enumerate() {
            if let Err(e) = joined {
                warn!(chunk = i + 1, error = %e, "worker task aborted");
                let chunk = &plan.chunks[i];
                results.lock().await.push(ChunkFinding {
                    index: chunk.index,
                    time_range: chunk.time_range_description(),
                    chunk_size: chunk.len(),
                    summary: String::new(),
                    failure: Some(format!("worker task aborted: {e}")),
                    elapsed_secs: 0.0,
                });
            }
        }

        let guard = results.lock().await;
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_format() {
        let metrics = RunMetrics {
            total_records: 25,
            records_analyzed: 25,
            dropped_records: 0,
            chunks: 3,
            elapsed_secs: 1.234,
        };
        assert_eq!(metrics.summary_line(), "[Metadata: 25 records, 3 chunks, 1.23s]");
    }
}
