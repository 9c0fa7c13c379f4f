//! Report generation.
//!
//! Renders a decoded [`AggregationTree`] as indented text, one line per
//! bucket and per metric, or as JSON.

use crate::aggregation::{AggregationResult, AggregationTree, NamedAggregation};
use crate::config::ReportConfig;
use anyhow::Result;

/// Options controlling text output.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Printed for metrics with no value.
    pub empty_placeholder: String,
    /// Prefix metric lines with their aggregation name.
    pub label_metrics: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for RenderOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            indent: config.indent,
            empty_placeholder: config.empty_placeholder.clone(),
            label_metrics: config.label_metrics,
        }
    }
}

/// Generate the text report.
///
/// Buckets print as `<key>:<doc_count>` with their nested aggregations one
/// level deeper; metrics print their value on a line of their own.
pub fn generate_text_report(tree: &AggregationTree, options: &RenderOptions) -> String {
    let mut output = String::new();
    render_level(&tree.aggregations, 0, options, &mut output);
    output
}

fn render_level(
    aggregations: &[NamedAggregation],
    depth: usize,
    options: &RenderOptions,
    output: &mut String,
) {
    for aggregation in aggregations {
        match &aggregation.result {
            AggregationResult::Buckets(buckets) => {
                for bucket in buckets {
                    push_line(output, depth, options, &format!("{}:{}", bucket.key, bucket.doc_count));
                    render_level(&bucket.aggregations, depth + 1, options, output);
                }
            }
            AggregationResult::Metric(value) => {
                let text = metric_text(*value, options);
                let line = if options.label_metrics {
                    format!("{}={}", aggregation.name, text)
                } else {
                    text
                };
                push_line(output, depth, options, &line);
            }
        }
    }
}

fn metric_text(value: Option<f64>, options: &RenderOptions) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => options.empty_placeholder.clone(),
    }
}

fn push_line(output: &mut String, depth: usize, options: &RenderOptions, line: &str) {
    output.push_str(&" ".repeat(depth * options.indent));
    output.push_str(line);
    output.push('\n');
}

/// Generate a JSON report.
pub fn generate_json_report(tree: &AggregationTree) -> Result<String> {
    serde_json::to_string_pretty(tree).map_err(Into::into)
}
