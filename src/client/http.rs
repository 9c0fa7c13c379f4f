//! HTTP transport for the cluster's JSON search API.

use crate::client::{ClusterInfo, SearchTransport};
use crate::config::ClusterConfig;
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Longest slice of an unparseable error body kept in messages.
const MAX_ERROR_BODY: usize = 200;

/// A [`SearchTransport`] backed by a `reqwest` client.
#[derive(Debug)]
pub struct HttpTransport {
    endpoint: String,
    expected_cluster: Option<String>,
    timeout_seconds: u64,
    client: Option<reqwest::Client>,
}

impl HttpTransport {
    /// Create a transport for the configured cluster. No request is sent yet.
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let endpoint = config.endpoint();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ReportError::ConnectionFailure {
                endpoint: endpoint.clone(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        debug!("HTTP transport created for {}", endpoint);

        Ok(Self {
            endpoint,
            expected_cluster: config.cluster_name.clone(),
            timeout_seconds: config.timeout_seconds,
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&reqwest::Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ReportError::ConnectionFailure {
                endpoint: self.endpoint.clone(),
                reason: "transport already closed".to_string(),
            })
    }

    fn connection_failure(&self, e: reqwest::Error) -> ReportError {
        let reason = if e.is_timeout() {
            format!("timed out after {}s", self.timeout_seconds)
        } else if e.is_connect() {
            format!("host unreachable ({})", e)
        } else {
            e.to_string()
        };
        ReportError::ConnectionFailure {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }

    fn query_failure(&self, index: &str, reason: String) -> ReportError {
        ReportError::QueryFailure {
            index: index.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn ping(&self) -> Result<ClusterInfo> {
        let client = self.client()?;
        let url = format!("{}/", self.endpoint);

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.connection_failure(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::ConnectionFailure {
                endpoint: self.endpoint.clone(),
                reason: error_reason(status, &body),
            });
        }

        let info: ClusterInfo =
            response
                .json()
                .await
                .map_err(|e| ReportError::ConnectionFailure {
                    endpoint: self.endpoint.clone(),
                    reason: format!("unexpected ping response: {}", e),
                })?;

        check_cluster_name(self.expected_cluster.as_deref(), &info).map_err(|reason| {
            ReportError::ConnectionFailure {
                endpoint: self.endpoint.clone(),
                reason,
            }
        })?;

        info!(
            "Connected to cluster '{}' (version {})",
            info.cluster_name,
            info.version_number()
        );
        Ok(info)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let client = self.client()?;
        let url = format!("{}/{}/_search", self.endpoint, index);
        debug!("POST {}", url);

        let response = client.post(&url).json(body).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timed out after {}s", self.timeout_seconds)
            } else {
                format!("failed to send request: {}", e)
            };
            self.query_failure(index, reason)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.query_failure(index, error_reason(status, &body)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| self.query_failure(index, format!("unreadable response body: {}", e)))
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("Closed HTTP transport to {}", self.endpoint);
        }
    }
}

/// Verify the cluster is the one we were configured for, if any.
fn check_cluster_name(expected: Option<&str>, info: &ClusterInfo) -> std::result::Result<(), String> {
    match expected {
        Some(expected) if expected != info.cluster_name => Err(format!(
            "expected cluster '{}' but found '{}'",
            expected, info.cluster_name
        )),
        _ => Ok(()),
    }
}

/// Build a readable reason from an error response.
///
/// The engine answers errors as `{"error": {"type": .., "reason": ..}, "status": ..}`,
/// or sometimes with a bare string under `error`.
fn error_reason(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| v.get("error")).and_then(|error| match error {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => {
            let kind = error.get("type").and_then(Value::as_str);
            let reason = error.get("reason").and_then(Value::as_str);
            match (kind, reason) {
                (Some(kind), Some(reason)) => Some(format!("{}: {}", kind, reason)),
                (Some(kind), None) => Some(kind.to_string()),
                (None, Some(reason)) => Some(reason.to_string()),
                (None, None) => None,
            }
        }
        _ => None,
    });

    match detail {
        Some(detail) => format!("{} {}", status, detail),
        None if body.trim().is_empty() => status.to_string(),
        None => {
            let snippet: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
            format!("{} {}", status, snippet)
        }
    }
}
