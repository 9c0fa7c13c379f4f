//! Scoped ownership of a transport.

use crate::client::{ClusterInfo, SearchTransport};
use crate::error::{ReportError, Result};
use serde_json::Value;
use tracing::debug;

/// An open connection to a cluster.
///
/// The transport is released exactly once: by [`Session::close`], or when the
/// session is dropped on an early return.
pub struct Session<T: SearchTransport> {
    transport: Option<T>,
    info: ClusterInfo,
}

impl<T: SearchTransport> Session<T> {
    /// Ping the cluster and take ownership of the transport.
    ///
    /// If the ping fails the transport is closed before the error is returned.
    pub async fn open(mut transport: T) -> Result<Self> {
        match transport.ping().await {
            Ok(info) => Ok(Self {
                transport: Some(transport),
                info,
            }),
            Err(e) => {
                transport.close();
                Err(e)
            }
        }
    }

    pub fn info(&self) -> &ClusterInfo {
        &self.info
    }

    pub async fn search(&self, index: &str, body: &Value) -> Result<Value> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| ReportError::QueryFailure {
                index: index.to_string(),
                reason: "session already closed".to_string(),
            })?;
        transport.search(index, body).await
    }

    /// Release the transport now.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("Releasing connection to {}", transport.endpoint());
            transport.close();
        }
    }
}

impl<T: SearchTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::StubTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_close_releases_once() {
        let stub = StubTransport::responding(json!({ "aggregations": {} }));
        let calls = stub.calls();

        let session = Session::open(stub).await.unwrap();
        assert_eq!(session.info().cluster_name, "stub");
        session.close();

        assert_eq!(calls.closes(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_once() {
        let stub = StubTransport::responding(json!({}));
        let calls = stub.calls();

        {
            let _session = Session::open(stub).await.unwrap();
        }

        assert_eq!(calls.closes(), 1);
    }

    #[tokio::test]
    async fn test_failed_open_releases_and_never_searches() {
        let stub = StubTransport::unreachable();
        let calls = stub.calls();

        assert!(Session::open(stub).await.is_err());
        assert_eq!(calls.pings(), 1);
        assert_eq!(calls.searches(), 0);
        assert_eq!(calls.closes(), 1);
    }
}
