//! Declarative aggregation shapes and the search request they produce.
//!
//! A query is an ordered list of [`AggregationSpec`] trees. Each node names
//! an aggregation, says what kind it is, and lists the aggregations nested
//! under each of its buckets.

use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;

/// One node of a nested aggregation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    /// Name the engine reports this aggregation under.
    pub name: String,

    /// What the aggregation computes.
    #[serde(flatten)]
    pub kind: AggregationKind,

    /// Aggregations computed inside each bucket of this one.
    #[serde(default, rename = "aggregations", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AggregationSpec>,
}

/// Supported aggregation kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationKind {
    /// One bucket per distinct value of `field`.
    Terms {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u32>,
    },
    /// One bucket per calendar interval over a date `field`.
    DateHistogram {
        field: String,
        interval: CalendarInterval,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_doc_count: Option<u64>,
    },
    Avg {
        field: String,
    },
    Sum {
        field: String,
    },
    Min {
        field: String,
    },
    Max {
        field: String,
    },
}

impl AggregationKind {
    /// Name of the aggregation in the engine's query DSL.
    pub fn dsl_name(&self) -> &'static str {
        match self {
            AggregationKind::Terms { .. } => "terms",
            AggregationKind::DateHistogram { .. } => "date_histogram",
            AggregationKind::Avg { .. } => "avg",
            AggregationKind::Sum { .. } => "sum",
            AggregationKind::Min { .. } => "min",
            AggregationKind::Max { .. } => "max",
        }
    }

    /// The document field the aggregation reads.
    pub fn field(&self) -> &str {
        match self {
            AggregationKind::Terms { field, .. }
            | AggregationKind::DateHistogram { field, .. }
            | AggregationKind::Avg { field }
            | AggregationKind::Sum { field }
            | AggregationKind::Min { field }
            | AggregationKind::Max { field } => field,
        }
    }

    /// Whether this kind produces buckets (as opposed to a single value).
    pub fn is_bucket(&self) -> bool {
        matches!(
            self,
            AggregationKind::Terms { .. } | AggregationKind::DateHistogram { .. }
        )
    }

    /// Whether the metric has no value over zero documents. A sum over
    /// nothing is still `0`.
    pub fn undefined_when_empty(&self) -> bool {
        matches!(
            self,
            AggregationKind::Avg { .. } | AggregationKind::Min { .. } | AggregationKind::Max { .. }
        )
    }

    fn dsl_params(&self) -> Value {
        match self {
            AggregationKind::Terms { field, size } => {
                let mut params = json!({ "field": field });
                if let Some(size) = size {
                    params["size"] = json!(size);
                }
                params
            }
            AggregationKind::DateHistogram {
                field,
                interval,
                min_doc_count,
            } => {
                let mut params = json!({
                    "field": field,
                    "calendar_interval": interval.as_str(),
                });
                if let Some(min) = min_doc_count {
                    params["min_doc_count"] = json!(min);
                }
                params
            }
            other => json!({ "field": other.field() }),
        }
    }
}

/// Calendar-aware histogram interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarInterval {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl CalendarInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarInterval::Minute => "minute",
            CalendarInterval::Hour => "hour",
            CalendarInterval::Day => "day",
            CalendarInterval::Week => "week",
            CalendarInterval::Month => "month",
            CalendarInterval::Quarter => "quarter",
            CalendarInterval::Year => "year",
        }
    }

    /// `chrono` format string used to print a bucket's start at this granularity.
    pub fn key_format(&self) -> &'static str {
        match self {
            CalendarInterval::Year => "%Y",
            CalendarInterval::Quarter | CalendarInterval::Month => "%Y-%m",
            CalendarInterval::Week | CalendarInterval::Day => "%Y-%m-%d",
            CalendarInterval::Hour | CalendarInterval::Minute => "%Y-%m-%dT%H:%M",
        }
    }
}

impl fmt::Display for CalendarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AggregationSpec {
    pub fn new(name: impl Into<String>, kind: AggregationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Nest `child` under every bucket of this aggregation.
    pub fn with_child(mut self, child: AggregationSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Employees grouped by country, then by year of joining, with the
    /// average salary of each year.
    pub fn employee_default() -> Vec<AggregationSpec> {
        let avg_salary = AggregationSpec::new(
            "avg_salary",
            AggregationKind::Avg {
                field: "salary".to_string(),
            },
        );
        let by_join_date = AggregationSpec::new(
            "group_by_join_date",
            AggregationKind::DateHistogram {
                field: "join_date".to_string(),
                interval: CalendarInterval::Year,
                min_doc_count: None,
            },
        )
        .with_child(avg_salary);
        let by_country = AggregationSpec::new(
            "group_by_country",
            AggregationKind::Terms {
                field: "country".to_string(),
                size: None,
            },
        )
        .with_child(by_join_date);

        vec![by_country]
    }

    /// Check a list of sibling specs, recursively.
    pub fn validate_all(specs: &[AggregationSpec]) -> Result<()> {
        if specs.is_empty() {
            return Err(ReportError::InvalidSpec(
                "at least one aggregation is required".to_string(),
            ));
        }
        validate_level(specs)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReportError::InvalidSpec(
                "aggregation name must not be empty".to_string(),
            ));
        }
        if self.kind.field().trim().is_empty() {
            return Err(ReportError::InvalidSpec(format!(
                "aggregation '{}' has an empty field",
                self.name
            )));
        }
        if let AggregationKind::Terms { size: Some(0), .. } = self.kind {
            return Err(ReportError::InvalidSpec(format!(
                "terms aggregation '{}' must have a size of at least 1",
                self.name
            )));
        }
        if !self.kind.is_bucket() && !self.children.is_empty() {
            return Err(ReportError::InvalidSpec(format!(
                "metric aggregation '{}' cannot have nested aggregations",
                self.name
            )));
        }
        validate_level(&self.children)
    }

    fn to_dsl(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.kind.dsl_name().to_string(), self.kind.dsl_params());
        if !self.children.is_empty() {
            body.insert("aggs".to_string(), aggs_object(&self.children));
        }
        Value::Object(body)
    }
}

fn validate_level(specs: &[AggregationSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        spec.validate()?;
        if !seen.insert(spec.name.as_str()) {
            return Err(ReportError::InvalidSpec(format!(
                "duplicate aggregation name '{}'",
                spec.name
            )));
        }
    }
    Ok(())
}

fn aggs_object(specs: &[AggregationSpec]) -> Value {
    let aggs: Map<String, Value> = specs
        .iter()
        .map(|spec| (spec.name.clone(), spec.to_dsl()))
        .collect();
    Value::Object(aggs)
}

/// Build an aggregation-only search body (no hits are returned).
pub fn build_search_body(specs: &[AggregationSpec]) -> Value {
    json!({
        "size": 0,
        "aggs": aggs_object(specs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_default_body() {
        let body = build_search_body(&AggregationSpec::employee_default());

        assert_eq!(body["size"], 0);
        let country = &body["aggs"]["group_by_country"];
        assert_eq!(country["terms"]["field"], "country");

        let join_date = &country["aggs"]["group_by_join_date"];
        assert_eq!(join_date["date_histogram"]["field"], "join_date");
        assert_eq!(join_date["date_histogram"]["calendar_interval"], "year");

        let avg = &join_date["aggs"]["avg_salary"];
        assert_eq!(avg["avg"]["field"], "salary");
        assert!(avg.get("aggs").is_none());
    }

    #[test]
    fn test_optional_params_only_when_set() {
        let spec = AggregationSpec::new(
            "by_country",
            AggregationKind::Terms {
                field: "country".to_string(),
                size: Some(25),
            },
        );
        let body = build_search_body(&[spec]);
        assert_eq!(body["aggs"]["by_country"]["terms"]["size"], 25);

        let hist = AggregationSpec::new(
            "by_month",
            AggregationKind::DateHistogram {
                field: "join_date".to_string(),
                interval: CalendarInterval::Month,
                min_doc_count: None,
            },
        );
        let body = build_search_body(&[hist]);
        assert!(body["aggs"]["by_month"]["date_histogram"]
            .get("min_doc_count")
            .is_none());
    }

    #[test]
    fn test_validate_default_ok() {
        assert!(AggregationSpec::validate_all(&AggregationSpec::employee_default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(AggregationSpec::validate_all(&[]).is_err());

        let metric_with_child = AggregationSpec::new(
            "avg_salary",
            AggregationKind::Avg {
                field: "salary".to_string(),
            },
        )
        .with_child(AggregationSpec::new(
            "max_salary",
            AggregationKind::Max {
                field: "salary".to_string(),
            },
        ));
        assert!(AggregationSpec::validate_all(&[metric_with_child]).is_err());

        let dup = AggregationSpec::new(
            "x",
            AggregationKind::Sum {
                field: "salary".to_string(),
            },
        );
        assert!(AggregationSpec::validate_all(&[dup.clone(), dup]).is_err());

        let empty_field = AggregationSpec::new(
            "x",
            AggregationKind::Min {
                field: " ".to_string(),
            },
        );
        assert!(AggregationSpec::validate_all(&[empty_field]).is_err());
    }

    #[test]
    fn test_parse_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            aggregations: Vec<AggregationSpec>,
        }

        let toml_content = r#"
[[aggregations]]
name = "group_by_country"
type = "terms"
field = "country"
size = 5

[[aggregations.aggregations]]
name = "group_by_join_date"
type = "date_histogram"
field = "join_date"
interval = "year"

[[aggregations.aggregations.aggregations]]
name = "avg_salary"
type = "avg"
field = "salary"
"#;

        let parsed: Wrapper = toml::from_str(toml_content).unwrap();
        let mut expected = AggregationSpec::employee_default();
        expected[0].kind = AggregationKind::Terms {
            field: "country".to_string(),
            size: Some(5),
        };
        assert_eq!(parsed.aggregations, expected);
    }

    #[test]
    fn test_key_format_by_interval() {
        assert_eq!(CalendarInterval::Year.key_format(), "%Y");
        assert_eq!(CalendarInterval::Month.key_format(), "%Y-%m");
        assert_eq!(CalendarInterval::Day.key_format(), "%Y-%m-%d");
    }
}
