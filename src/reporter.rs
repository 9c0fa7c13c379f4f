//! The aggregation reporter.
//!
//! Opens a session, runs one aggregation-only search, decodes the response
//! into an [`AggregationTree`] and releases the connection. Nothing is
//! printed here: callers render the tree only once it is fully decoded.

use crate::aggregation::{build_search_body, AggregationSpec, AggregationTree};
use crate::client::{SearchTransport, Session};
use crate::error::Result;
use tracing::{debug, info};

/// What to run against the cluster.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub index: String,
    pub aggregations: Vec<AggregationSpec>,
}

impl From<&crate::config::QueryConfig> for ReportRequest {
    fn from(config: &crate::config::QueryConfig) -> Self {
        Self {
            index: config.index.clone(),
            aggregations: config.aggregations.clone(),
        }
    }
}

pub struct AggregationReporter<T: SearchTransport> {
    transport: T,
    request: ReportRequest,
}

impl<T: SearchTransport> AggregationReporter<T> {
    pub fn new(transport: T, request: ReportRequest) -> Self {
        Self { transport, request }
    }

    /// Run the query and decode the result.
    ///
    /// The transport is closed exactly once whatever the outcome.
    pub async fn run(self) -> Result<AggregationTree> {
        let Self {
            mut transport,
            request,
        } = self;

        if let Err(e) = AggregationSpec::validate_all(&request.aggregations) {
            transport.close();
            return Err(e);
        }

        info!("Connecting to {}", transport.endpoint());
        let session = Session::open(transport).await?;

        let body = build_search_body(&request.aggregations);
        debug!("Search body: {}", body);
        info!(
            "Running aggregation on index '{}' of cluster '{}'",
            request.index,
            session.info().cluster_name
        );

        let outcome = session
            .search(&request.index, &body)
            .await
            .and_then(|response| AggregationTree::decode(&request.aggregations, &response));

        session.close();

        let tree = outcome?;
        info!(
            "Decoded {} top-level aggregation(s)",
            tree.aggregations.len()
        );
        Ok(tree)
    }
}
