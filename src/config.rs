//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.aggreport.toml` files.

use crate::aggregation::AggregationSpec;
use crate::error::ReportError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".aggreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cluster connection settings.
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// What to query.
    #[serde(default)]
    pub query: QueryConfig,

    /// Output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// URL scheme used to reach the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Cluster connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub scheme: Scheme,

    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port of the cluster.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Refuse to query a cluster reporting a different name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::default(),
            host: default_host(),
            port: default_port(),
            cluster_name: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl ClusterConfig {
    /// Base URL of the cluster, e.g. `http://localhost:9200`.
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Reject settings that can never reach a cluster.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.host.trim().is_empty() {
            return Err(ReportError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ReportError::InvalidConfig("port must be greater than 0".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(ReportError::InvalidConfig(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9200
}

fn default_timeout() -> u64 {
    30
}

/// Index and aggregation shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_index")]
    pub index: String,

    /// Top-level aggregations, each with its nested children.
    #[serde(default = "AggregationSpec::employee_default")]
    pub aggregations: Vec<AggregationSpec>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            aggregations: AggregationSpec::employee_default(),
        }
    }
}

fn default_index() -> String {
    "company".to_string()
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Spaces of indentation per nesting level.
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Printed instead of a metric computed over no documents.
    #[serde(default = "default_placeholder")]
    pub empty_placeholder: String,

    /// Prefix metric lines with `<name>=`.
    #[serde(default)]
    pub label_metrics: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            empty_placeholder: default_placeholder(),
            label_metrics: false,
        }
    }
}

fn default_indent() -> usize {
    2
}

fn default_placeholder() -> String {
    "no data".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load `.aggreport.toml` from `dir`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default_in(dir: &Path) -> Result<Option<Self>> {
        let default_path = dir.join(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(&default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or through their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(scheme) = args.scheme {
            self.cluster.scheme = scheme;
        }
        if let Some(ref host) = args.host {
            self.cluster.host = host.clone();
        }
        if let Some(port) = args.port {
            self.cluster.port = port;
        }
        if let Some(ref cluster_name) = args.cluster_name {
            self.cluster.cluster_name = Some(cluster_name.clone());
        }
        if let Some(timeout) = args.timeout {
            self.cluster.timeout_seconds = timeout;
        }

        if let Some(ref index) = args.index {
            self.query.index = index.clone();
        }

        if let Some(ref placeholder) = args.placeholder {
            self.report.empty_placeholder = placeholder.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
