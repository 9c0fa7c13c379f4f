//! Typed aggregation results.
//!
//! The engine answers with a JSON object keyed by aggregation name. This
//! module walks that object alongside the [`AggregationSpec`] tree that
//! produced it and turns every node into a tagged [`AggregationResult`],
//! failing with a named error when a key is missing or has the wrong shape.

use crate::aggregation::spec::{AggregationKind, AggregationSpec, CalendarInterval};
use crate::error::{ReportError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The key of a single bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BucketKey {
    /// A term such as a country name.
    Term(String),
    /// An integral term, kept exact.
    Integer(i64),
    /// An integral term above `i64::MAX`.
    Unsigned(u64),
    /// A floating-point term.
    Number(f64),
    /// Start of a histogram interval.
    Date {
        epoch_millis: i64,
        formatted: String,
    },
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Term(term) => write!(f, "{}", term),
            BucketKey::Integer(n) => write!(f, "{}", n),
            BucketKey::Unsigned(n) => write!(f, "{}", n),
            BucketKey::Number(n) => write!(f, "{}", n),
            BucketKey::Date { formatted, .. } => write!(f, "{}", formatted),
        }
    }
}

/// One group produced by a bucket aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub key: BucketKey,
    pub doc_count: u64,
    /// Results of the nested aggregations, in request order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<NamedAggregation>,
}

/// The decoded value of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationResult {
    /// Buckets in the order the engine returned them.
    Buckets(Vec<Bucket>),
    /// A single metric; `None` when there was nothing to compute it over.
    Metric(Option<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedAggregation {
    pub name: String,
    pub result: AggregationResult,
}

/// The complete decoded response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationTree {
    pub aggregations: Vec<NamedAggregation>,
}

impl AggregationTree {
    /// Decode a search response against the specs that produced it.
    pub fn decode(specs: &[AggregationSpec], response: &Value) -> Result<Self> {
        let root = match response.get("aggregations") {
            Some(root) => root,
            None => {
                let key = specs.first().map(|s| s.name.clone()).unwrap_or_default();
                return Err(ReportError::MissingAggregationKey {
                    key,
                    path: "response".to_string(),
                });
            }
        };

        let aggregations = decode_level(specs, root, "aggregations", None)?;
        Ok(Self { aggregations })
    }

    /// Look up a top-level aggregation by name.
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&AggregationResult> {
        self.aggregations
            .iter()
            .find(|agg| agg.name == name)
            .map(|agg| &agg.result)
    }
}

impl Bucket {
    /// Look up a nested aggregation by name.
    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&AggregationResult> {
        self.aggregations
            .iter()
            .find(|agg| agg.name == name)
            .map(|agg| &agg.result)
    }
}

/// Decode every spec at one nesting level.
///
/// `doc_count` is the count of the enclosing bucket, if any. Averages, minima
/// and maxima inside an empty bucket are absent regardless of what the engine
/// sent.
fn decode_level(
    specs: &[AggregationSpec],
    container: &Value,
    path: &str,
    doc_count: Option<u64>,
) -> Result<Vec<NamedAggregation>> {
    specs
        .iter()
        .map(|spec| {
            let raw = container
                .get(&spec.name)
                .ok_or_else(|| ReportError::MissingAggregationKey {
                    key: spec.name.clone(),
                    path: path.to_string(),
                })?;

            let result = if spec.kind.is_bucket() {
                AggregationResult::Buckets(decode_buckets(spec, raw, path)?)
            } else {
                AggregationResult::Metric(decode_metric(spec, raw, doc_count)?)
            };

            Ok(NamedAggregation {
                name: spec.name.clone(),
                result,
            })
        })
        .collect()
}

fn decode_buckets(spec: &AggregationSpec, raw: &Value, path: &str) -> Result<Vec<Bucket>> {
    let buckets = raw
        .get("buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| unexpected(spec, "bucket", raw))?;

    buckets
        .iter()
        .map(|bucket| {
            let doc_count = bucket
                .get("doc_count")
                .and_then(Value::as_u64)
                .ok_or_else(|| ReportError::UnexpectedAggregationType {
                    key: spec.name.clone(),
                    expected: "bucket",
                    found: "bucket without doc_count".to_string(),
                })?;
            let key = decode_key(spec, bucket)?;
            let child_path = format!("{}.{}[{}]", path, spec.name, key);
            let aggregations = decode_level(&spec.children, bucket, &child_path, Some(doc_count))?;

            Ok(Bucket {
                key,
                doc_count,
                aggregations,
            })
        })
        .collect()
}

fn decode_key(spec: &AggregationSpec, bucket: &Value) -> Result<BucketKey> {
    let raw_key = bucket.get("key").ok_or_else(|| ReportError::UnexpectedAggregationType {
        key: spec.name.clone(),
        expected: "bucket",
        found: "bucket without key".to_string(),
    })?;

    match &spec.kind {
        AggregationKind::DateHistogram { interval, .. } => {
            let millis = raw_key
                .as_i64()
                .or_else(|| raw_key.as_f64().map(|f| f as i64))
                .ok_or_else(|| ReportError::UnexpectedAggregationType {
                    key: spec.name.clone(),
                    expected: "date bucket",
                    found: format!("key {}", raw_key),
                })?;
            date_key(spec, millis, *interval)
        }
        _ => {
            if let Some(as_string) = bucket.get("key_as_string").and_then(Value::as_str) {
                return Ok(BucketKey::Term(as_string.to_string()));
            }
            match raw_key {
                Value::String(term) => Ok(BucketKey::Term(term.clone())),
                Value::Number(n) => n
                    .as_i64()
                    .map(BucketKey::Integer)
                    .or_else(|| n.as_u64().map(BucketKey::Unsigned))
                    .or_else(|| n.as_f64().map(BucketKey::Number))
                    .ok_or_else(|| ReportError::UnexpectedAggregationType {
                        key: spec.name.clone(),
                        expected: "terms bucket",
                        found: format!("key {}", n),
                    }),
                other => Err(ReportError::UnexpectedAggregationType {
                    key: spec.name.clone(),
                    expected: "terms bucket",
                    found: format!("key {}", other),
                }),
            }
        }
    }
}

fn date_key(spec: &AggregationSpec, millis: i64, interval: CalendarInterval) -> Result<BucketKey> {
    let start = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        ReportError::UnexpectedAggregationType {
            key: spec.name.clone(),
            expected: "date bucket",
            found: format!("out-of-range timestamp {}", millis),
        }
    })?;

    Ok(BucketKey::Date {
        epoch_millis: millis,
        formatted: start.format(interval.key_format()).to_string(),
    })
}

fn decode_metric(spec: &AggregationSpec, raw: &Value, doc_count: Option<u64>) -> Result<Option<f64>> {
    let value = raw
        .get("value")
        .ok_or_else(|| unexpected(spec, "metric", raw))?;

    if doc_count == Some(0) && spec.kind.undefined_when_empty() {
        return Ok(None);
    }

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64().filter(|v| v.is_finite())),
        other => Err(ReportError::UnexpectedAggregationType {
            key: spec.name.clone(),
            expected: "metric",
            found: format!("value {}", other),
        }),
    }
}

fn unexpected(spec: &AggregationSpec, expected: &'static str, raw: &Value) -> ReportError {
    ReportError::UnexpectedAggregationType {
        key: spec.name.clone(),
        expected,
        found: describe(raw).to_string(),
    }
}

fn describe(raw: &Value) -> &'static str {
    match raw {
        Value::Object(map) if map.contains_key("buckets") => "bucket aggregation",
        Value::Object(map) if map.contains_key("value") => "metric aggregation",
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}
