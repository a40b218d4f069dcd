//! Shared data model for the analysis pipeline and the remediation
//! orchestrator.
//!
//! Every type here is created by exactly one pipeline stage and handed to the
//! next by value or shared reference; nothing is mutated after construction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, TriageError};

/// A half-open `[start, end)` query interval, both ends UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(TriageError::InvalidTimeFormat(format!(
                "start must precede end: {start} >= {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn describe(&self) -> String {
        format!("{} to {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// One structured log line as returned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Remaining raw fields, internal pointer fields already stripped.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }
}

/// A bounded, ordered slice of the record sequence analyzed by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChunk {
    /// Zero-based position within the plan; chunk i precedes chunk i+1 in time.
    pub index: usize,
    pub total: usize,
    pub records: Vec<LogRecord>,
}

impl LogChunk {
    /// Human-readable time range covered by this chunk.
    pub fn time_range_description(&self) -> String {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => format!(
                "{} to {}",
                first.timestamp.to_rfc3339(),
                last.timestamp.to_rfc3339()
            ),
            _ => format!("chunk {} of {}", self.index + 1, self.total),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// An error the triage stage judged safe and mechanical to repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixableError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Short identifier for the error category. Doubles as the branch-name
    /// stem, so it must stay stable across repeated sightings of the same
    /// defect and contain only branch-safe characters.
    pub fix_short_name: String,
}

impl FixableError {
    pub fn new(
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        fix_short_name: impl Into<String>,
    ) -> Result<Self> {
        let fix_short_name = fix_short_name.into();
        validate_short_name(&fix_short_name)?;
        Ok(Self {
            message: message.into(),
            timestamp,
            fix_short_name,
        })
    }
}

fn validate_short_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TriageError::InvalidFixableError(
            "fix_short_name must not be empty".to_string(),
        ));
    }
    let ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        return Err(TriageError::InvalidFixableError(format!(
            "fix_short_name contains characters unsafe for a branch name: {name}"
        )));
    }
    Ok(())
}

/// The answer produced for one chunk or, after synthesis, for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub summary: String,
    #[serde(default)]
    pub fixable_errors: Vec<FixableError>,
}

impl Finding {
    pub fn text(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            fixable_errors: Vec::new(),
        }
    }
}

/// Title and description for the proposed change, generated once per fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMetadata {
    pub title: String,
    pub description: String,
}

impl ChangeMetadata {
    /// Clamp the title to at most `max_words` words. The summary model is
    /// prompted for a short imperative title; this is the hard backstop.
    pub fn clamp_title(mut self, max_words: usize) -> Self {
        let words: Vec<&str> = self.title.split_whitespace().collect();
        if words.len() > max_words {
            self.title = words[..max_words].join(" ");
        }
        self
    }
}

/// Identifier of a proposed change on the hosting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeId(pub String);

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of one remediation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    /// A branch for this `fix_short_name` already exists remotely; no-op.
    SkippedDuplicate,
    /// The fix capability produced no usable result; nothing was written.
    FixFailed,
    /// A proposed change was opened.
    Proposed,
}

/// Outcome of one orchestrator invocation. Not retained across runs; the
/// durable dedup state is the remote branch list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    pub branch_name: String,
    pub status: RemediationStatus,
    pub change_id: Option<ChangeId>,
}

impl RemediationOutcome {
    /// `true` when no further action is needed for this error.
    pub fn completed(&self) -> bool {
        !matches!(self.status, RemediationStatus::FixFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_time_range_rejects_inverted_interval() {
        let later = ts() + chrono::Duration::hours(1);
        assert!(TimeRange::new(later, ts()).is_err());
        assert!(TimeRange::new(ts(), ts()).is_err());
        assert!(TimeRange::new(ts(), later).is_ok());
    }

    #[test]
    fn test_fix_short_name_validation() {
        assert!(FixableError::new("boom", ts(), "div-zero").is_ok());
        assert!(FixableError::new("boom", ts(), "fix_null_check").is_ok());
        assert!(FixableError::new("boom", ts(), "").is_err());
        assert!(FixableError::new("boom", ts(), "bad name").is_err());
        assert!(FixableError::new("boom", ts(), "x/y").is_err());
    }

    #[test]
    fn test_chunk_time_range_description_uses_record_bounds() {
        let chunk = LogChunk {
            index: 0,
            total: 1,
            records: vec![
                LogRecord::new(ts(), "a"),
                LogRecord::new(ts() + chrono::Duration::minutes(5), "b"),
            ],
        };
        let desc = chunk.time_range_description();
        assert!(desc.contains("2025-01-15T12:00:00"));
        assert!(desc.contains("2025-01-15T12:05:00"));
    }

    #[test]
    fn test_clamp_title_limits_word_count() {
        let meta = ChangeMetadata {
            title: "fix one two three four five six seven eight nine ten eleven".to_string(),
            description: "d".to_string(),
        }
        .clamp_title(10);
        assert_eq!(meta.title.split_whitespace().count(), 10);
    }

    #[test]
    fn test_outcome_completed() {
        let done = RemediationOutcome {
            branch_name: "autofix/x-1".to_string(),
            status: RemediationStatus::SkippedDuplicate,
            change_id: None,
        };
        assert!(done.completed());

        let failed = RemediationOutcome {
            branch_name: "autofix/x-1".to_string(),
            status: RemediationStatus::FixFailed,
            change_id: None,
        };
        assert!(!failed.completed());
    }
}
