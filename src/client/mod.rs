//! Search cluster clients.
//!
//! [`SearchTransport`] is the seam between the reporter and the network; the
//! HTTP implementation lives in [`http`], and [`Session`] guarantees that a
//! transport is released exactly once.

pub mod http;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub use http::HttpTransport;
pub use session::Session;

/// What the cluster reports about itself when pinged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub version: Option<ClusterVersion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterVersion {
    pub number: String,
}

impl ClusterInfo {
    pub fn version_number(&self) -> &str {
        self.version.as_ref().map(|v| v.number.as_str()).unwrap_or("unknown")
    }
}

/// A connection to a search cluster.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// The endpoint this transport talks to, for messages.
    fn endpoint(&self) -> String;

    /// Check that the cluster is reachable.
    async fn ping(&self) -> Result<ClusterInfo>;

    /// Run a search request against `index` and return the raw response.
    async fn search(&self, index: &str, body: &Value) -> Result<Value>;

    /// Release the underlying network resources.
    fn close(&mut self);
}
