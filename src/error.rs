//! Error types for the aggregation reporter.
//!
//! Every failure carries the stage it happened in so the binary can tell
//! the user whether connecting, querying, or reading the response went wrong.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The stage of a run in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Loading or validating configuration.
    Config,
    /// Reaching the cluster.
    Connect,
    /// Executing the search request.
    Query,
    /// Interpreting the aggregation response.
    ParseResponse,
    /// Writing the rendered report.
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => write!(f, "config"),
            Stage::Connect => write!(f, "connect"),
            Stage::Query => write!(f, "query"),
            Stage::ParseResponse => write!(f, "parse-response"),
            Stage::Output => write!(f, "output"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Cannot connect to cluster at {endpoint}: {reason}")]
    ConnectionFailure { endpoint: String, reason: String },

    #[error("Search on index '{index}' failed: {reason}")]
    QueryFailure { index: String, reason: String },

    #[error("Aggregation '{key}' missing from response at '{path}'")]
    MissingAggregationKey { key: String, path: String },

    #[error("Aggregation '{key}' is not a {expected} result (found {found})")]
    UnexpectedAggregationType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Invalid aggregation spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid cluster settings: {0}")]
    InvalidConfig(String),

    #[error("Failed to write report to {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReportError {
    /// Returns the stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ReportError::ConnectionFailure { .. } => Stage::Connect,
            ReportError::QueryFailure { .. } => Stage::Query,
            ReportError::MissingAggregationKey { .. }
            | ReportError::UnexpectedAggregationType { .. } => Stage::ParseResponse,
            ReportError::InvalidSpec(_) | ReportError::InvalidConfig(_) => Stage::Config,
            ReportError::Output { .. } => Stage::Output,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Connect.to_string(), "connect");
        assert_eq!(Stage::Query.to_string(), "query");
        assert_eq!(Stage::ParseResponse.to_string(), "parse-response");
        assert_eq!(Stage::Config.to_string(), "config");
    }

    #[test]
    fn test_missing_key_message_names_key() {
        let err = ReportError::MissingAggregationKey {
            key: "avg_salary".to_string(),
            path: "group_by_country[US].group_by_join_date[2020]".to_string(),
        };
        assert_eq!(err.stage(), Stage::ParseResponse);
        assert!(err.to_string().contains("'avg_salary'"));
        assert!(err.to_string().contains("group_by_join_date[2020]"));
    }

    #[test]
    fn test_error_stages() {
        let conn = ReportError::ConnectionFailure {
            endpoint: "http://localhost:9200".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(conn.stage(), Stage::Connect);

        let query = ReportError::QueryFailure {
            index: "company".to_string(),
            reason: "index_not_found_exception".to_string(),
        };
        assert_eq!(query.stage(), Stage::Query);
        assert_eq!(ReportError::InvalidSpec("x".into()).stage(), Stage::Config);
        assert_eq!(ReportError::InvalidConfig("x".into()).stage(), Stage::Config);
    }
}
