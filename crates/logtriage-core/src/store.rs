//! HTTP-backed [`RecordStore`] speaking an Insights-style query protocol:
//! start a query over a time range, poll until it completes, collect rows.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::capabilities::RecordStore;
use crate::domain::error::{Result, TriageError};
use crate::domain::model::{LogRecord, TimeRange};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: usize = 120;

/// Record store client polling a remote log-query API.
pub struct InsightsRecordStore {
    client: reqwest::Client,
    endpoint: String,
    log_group: String,
}

#[derive(Deserialize)]
struct StartQueryReply {
    #[serde(rename = "queryId")]
    query_id: String,
}

#[derive(Deserialize)]
struct QueryStatusReply {
    status: String,
    #[serde(default)]
    results: Vec<BTreeMap<String, String>>,
}

impl InsightsRecordStore {
    pub fn new(endpoint: impl Into<String>, log_group: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            log_group: log_group.into(),
        }
    }

    async fn start_query(&self, query: &str, range: &TimeRange) -> Result<String> {
        let url = format!("{}/queries", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "logGroupName": self.log_group,
                "queryString": query,
                "startTime": range.start.timestamp(),
                "endTime": range.end.timestamp(),
            }))
            .send()
            .await
            .map_err(|e| TriageError::StoreUnavailable(format!("start query: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::QueryInvalid(body));
        }
        if !status.is_success() {
            return Err(TriageError::StoreUnavailable(format!(
                "start query returned {status}"
            )));
        }

        let reply: StartQueryReply = response
            .json()
            .await
            .map_err(|e| TriageError::StoreUnavailable(format!("start query reply: {e}")))?;
        Ok(reply.query_id)
    }

    async fn poll_query(&self, query_id: &str) -> Result<Vec<BTreeMap<String, String>>> {
        let url = format!("{}/queries/{query_id}", self.endpoint);
        for _ in 0..MAX_POLLS {
            let reply: QueryStatusReply = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| TriageError::StoreUnavailable(format!("poll query: {e}")))?
                .json()
                .await
                .map_err(|e| TriageError::StoreUnavailable(format!("poll query reply: {e}")))?;

            match reply.status.as_str() {
                "Complete" => return Ok(reply.results),
                "Running" | "Scheduled" => {
                    debug!(query_id, "query still running");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                other => {
                    return Err(TriageError::StoreUnavailable(format!(
                        "query {query_id} ended in state {other}"
                    )))
                }
            }
        }
        Err(TriageError::StoreUnavailable(format!(
            "query {query_id} did not complete in time"
        )))
    }
}

/// Convert one result row into a [`LogRecord`], dropping the store's
/// internal pointer fields.
fn record_from_row(row: BTreeMap<String, String>) -> Result<LogRecord> {
    let mut timestamp = None;
    let mut message = String::new();
    let mut fields = BTreeMap::new();

    for (key, value) in row {
        match key.as_str() {
            "@timestamp" => timestamp = Some(parse_store_timestamp(&value)?),
            "@message" => message = value,
            "@ptr" => {}
            _ => {
                fields.insert(key, value);
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        TriageError::StoreUnavailable("result row missing @timestamp".to_string())
    })?;
    Ok(LogRecord {
        timestamp,
        message,
        fields,
    })
}

fn parse_store_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    // Store rows use `2025-01-15 12:00:00.000`; fall back to RFC3339.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.3f") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TriageError::StoreUnavailable(format!("unparseable row timestamp: {raw}")))
}

#[async_trait]
impl RecordStore for InsightsRecordStore {
    async fn fetch(&self, query: &str, range: &TimeRange) -> Result<Vec<LogRecord>> {
        let query_id = self.start_query(query, range).await?;
        info!(query_id = %query_id, range = %range, "log query started");

        let rows = self.poll_query(&query_id).await?;
        let mut records = rows
            .into_iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?;
        // The query sorts ascending; enforce it anyway so chunk ordering
        // never depends on store behavior.
        records.sort_by_key(|r| r.timestamp);

        info!(records = records.len(), "log query complete");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion_strips_pointer_field() {
        let mut row = BTreeMap::new();
        row.insert("@timestamp".to_string(), "2025-01-15 12:00:00.000".to_string());
        row.insert("@message".to_string(), "boom".to_string());
        row.insert("@ptr".to_string(), "opaque".to_string());
        row.insert("requestId".to_string(), "r-1".to_string());

        let record = record_from_row(row).unwrap();
        assert_eq!(record.message, "boom");
        assert_eq!(record.fields.get("requestId").unwrap(), "r-1");
        assert!(!record.fields.contains_key("@ptr"));
    }

    #[test]
    fn test_row_without_timestamp_is_rejected() {
        let mut row = BTreeMap::new();
        row.insert("@message".to_string(), "boom".to_string());
        assert!(record_from_row(row).is_err());
    }

    #[test]
    fn test_timestamp_parsing_accepts_both_formats() {
        assert!(parse_store_timestamp("2025-01-15 12:00:00.123").is_ok());
        assert!(parse_store_timestamp("2025-01-15T12:00:00Z").is_ok());
        assert!(parse_store_timestamp("yesterday-ish").is_err());
    }
}
