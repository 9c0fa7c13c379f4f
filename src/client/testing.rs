//! In-memory transport that records how it was used.

use crate::client::{ClusterInfo, SearchTransport};
use crate::error::{ReportError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct CallLog {
    pings: AtomicUsize,
    searches: AtomicUsize,
    closes: AtomicUsize,
}

impl CallLog {
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

enum Behavior {
    Respond(Value),
    Unreachable,
    RejectQuery(String),
}

pub struct StubTransport {
    behavior: Behavior,
    calls: Arc<CallLog>,
}

impl StubTransport {
    /// Pings succeed and every search returns `response`.
    pub fn responding(response: Value) -> Self {
        Self::with(Behavior::Respond(response))
    }

    /// Pings fail as if the host could not be reached.
    pub fn unreachable() -> Self {
        Self::with(Behavior::Unreachable)
    }

    /// Pings succeed but searches are rejected with `reason`.
    pub fn rejecting(reason: &str) -> Self {
        Self::with(Behavior::RejectQuery(reason.to_string()))
    }

    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(CallLog::default()),
        }
    }

    pub fn calls(&self) -> Arc<CallLog> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SearchTransport for StubTransport {
    fn endpoint(&self) -> String {
        "stub://cluster".to_string()
    }

    async fn ping(&self) -> Result<ClusterInfo> {
        self.calls.pings.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Unreachable => Err(ReportError::ConnectionFailure {
                endpoint: self.endpoint(),
                reason: "host unreachable".to_string(),
            }),
            _ => Ok(ClusterInfo {
                cluster_name: "stub".to_string(),
                version: None,
            }),
        }
    }

    async fn search(&self, index: &str, _body: &Value) -> Result<Value> {
        self.calls.searches.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Respond(response) => Ok(response.clone()),
            Behavior::RejectQuery(reason) => Err(ReportError::QueryFailure {
                index: index.to_string(),
                reason: reason.clone(),
            }),
            Behavior::Unreachable => Err(ReportError::ConnectionFailure {
                endpoint: self.endpoint(),
                reason: "host unreachable".to_string(),
            }),
        }
    }

    fn close(&mut self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}
