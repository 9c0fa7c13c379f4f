//! Aggregation request shapes and decoded results.

pub mod result;
pub mod spec;

pub use result::{AggregationResult, AggregationTree, NamedAggregation};
pub use spec::{build_search_body, AggregationSpec};
