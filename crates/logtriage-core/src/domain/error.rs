//! Domain-level error taxonomy for logtriage.

/// Errors produced while answering a log question or driving a remediation.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid record store query: {0}")]
    QueryInvalid(String),

    #[error("analysis model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model response does not match requested schema: {0}")]
    ResponseMalformed(String),

    #[error("repository unavailable: {0}")]
    RepoUnavailable(String),

    #[error("authentication failure: {0}")]
    AuthFailure(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("base branch missing: {0}")]
    BaseBranchMissing(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid fixable error: {0}")]
    InvalidFixableError(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for logtriage domain operations.
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TriageError::InvalidTimeFormat("garbled".to_string());
        assert!(err.to_string().contains("invalid time format"));

        let err = TriageError::RepoUnavailable("clone failed".to_string());
        assert!(err.to_string().contains("repository unavailable"));
        assert!(err.to_string().contains("clone failed"));
    }

    #[test]
    fn test_response_malformed_carries_detail() {
        let err = TriageError::ResponseMalformed("missing field `summary`".to_string());
        assert!(err.to_string().contains("missing field `summary`"));
    }
}
