//! Chunking engine.
//!
//! Partitions an ordered record sequence into bounded-size chunks for
//! parallel analysis, or a single chunk (the triage route) when the sequence
//! fits the size threshold. Deterministic; no side effects.

use tracing::{info, warn};

use crate::domain::model::{LogChunk, LogRecord};

/// The result of partitioning one record sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunks: Vec<LogChunk>,
    /// Records beyond `max_chunks * max_chunk_size` that were dropped from
    /// analysis. A deliberate fan-out bound, surfaced so callers can notice
    /// the truncation.
    pub dropped_records: usize,
}

impl ChunkPlan {
    /// Partition `records` into at most `max_chunks` chunks of at most
    /// `max_chunk_size` records each, preserving order.
    pub fn build(records: Vec<LogRecord>, max_chunk_size: usize, max_chunks: usize) -> Self {
        debug_assert!(max_chunk_size > 0 && max_chunks > 0);

        let total = records.len();
        if total <= max_chunk_size {
            let chunks = if records.is_empty() {
                Vec::new()
            } else {
                vec![LogChunk {
                    index: 0,
                    total: 1,
                    records,
                }]
            };
            return Self {
                chunks,
                dropped_records: 0,
            };
        }

        let capacity = max_chunk_size * max_chunks;
        let dropped_records = total.saturating_sub(capacity);
        let kept = total - dropped_records;
        let chunk_count = kept.div_ceil(max_chunk_size);

        let mut chunks = Vec::with_capacity(chunk_count);
        let mut iter = records.into_iter().take(kept);
        for index in 0..chunk_count {
            let records: Vec<LogRecord> = iter.by_ref().take(max_chunk_size).collect();
            chunks.push(LogChunk {
                index,
                total: chunk_count,
                records,
            });
        }

        info!(
            total_records = total,
            chunks = chunks.len(),
            "partitioned records for parallel analysis"
        );
        if dropped_records > 0 {
            warn!(
                dropped_records,
                max_chunks, "record set exceeds chunk budget; tail dropped from analysis"
            );
        }

        Self {
            chunks,
            dropped_records,
        }
    }

    /// Single-chunk plans take the triage path.
    pub fn is_triage(&self) -> bool {
        self.chunks.len() == 1
    }

    pub fn records_analyzed(&self) -> usize {
        self.chunks.iter().map(LogChunk::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn records(n: usize) -> Vec<LogRecord> {
        let base = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| LogRecord::new(base + Duration::seconds(i as i64), format!("line {i}")))
            .collect()
    }

    #[test]
    fn test_small_sequence_yields_single_chunk() {
        let plan = ChunkPlan::build(records(3), 10, 5);
        assert!(plan.is_triage());
        assert_eq!(plan.chunks[0].records.len(), 3);
        assert_eq!(plan.dropped_records, 0);
    }

    #[test]
    fn test_boundary_sequence_still_single_chunk() {
        let plan = ChunkPlan::build(records(10), 10, 5);
        assert_eq!(plan.chunks.len(), 1);
    }

    #[test]
    fn test_partition_preserves_order_without_loss() {
        let input = records(25);
        let plan = ChunkPlan::build(input.clone(), 10, 5);

        let sizes: Vec<usize> = plan.chunks.iter().map(LogChunk::len).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        let rejoined: Vec<LogRecord> = plan
            .chunks
            .iter()
            .flat_map(|c| c.records.iter().cloned())
            .collect();
        assert_eq!(rejoined, input);
        assert_eq!(plan.dropped_records, 0);
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let plan = ChunkPlan::build(records(25), 10, 5);
        for (i, chunk) in plan.chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, 3);
        }
    }

    #[test]
    fn test_overflow_drops_tail_and_reports_count() {
        let input = records(57);
        let plan = ChunkPlan::build(input.clone(), 10, 5);

        assert_eq!(plan.chunks.len(), 5);
        assert_eq!(plan.dropped_records, 7);
        assert_eq!(plan.records_analyzed(), 50);

        // The kept prefix is exactly the first 50 records in order.
        let rejoined: Vec<LogRecord> = plan
            .chunks
            .iter()
            .flat_map(|c| c.records.iter().cloned())
            .collect();
        assert_eq!(rejoined.as_slice(), &input[..50]);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let plan = ChunkPlan::build(Vec::new(), 10, 5);
        assert!(plan.chunks.is_empty());
        assert!(!plan.is_triage());
    }
}
