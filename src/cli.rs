//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::Scheme;
use clap::Parser;
use std::path::PathBuf;

/// aggreport - nested aggregation reports from a search cluster
///
/// Groups the documents of an index by a nested aggregation (by default:
/// country, then year of joining, then average salary) and prints the
/// resulting bucket tree.
///
/// Examples:
///   aggreport
///   aggreport --host search.internal --port 9243 --scheme https
///   aggreport --index staff --format json --output report.json
///   aggreport --dry-run
///   aggreport --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Cluster host name or address
    #[arg(long, value_name = "HOST", env = "AGGREPORT_HOST")]
    pub host: Option<String>,

    /// Cluster HTTP port
    #[arg(short, long, value_name = "PORT", env = "AGGREPORT_PORT")]
    pub port: Option<u16>,

    /// URL scheme (http, https)
    #[arg(long, value_name = "SCHEME")]
    pub scheme: Option<Scheme>,

    /// Index to aggregate over
    #[arg(short, long, value_name = "INDEX", env = "AGGREPORT_INDEX")]
    pub index: Option<String>,

    /// Expected cluster name; the run aborts if the cluster reports another
    #[arg(long, value_name = "NAME")]
    pub cluster_name: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .aggreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Text printed for a metric over an empty bucket
    #[arg(long, value_name = "TEXT")]
    pub placeholder: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress spinner)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the search request that would be sent and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .aggreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Indented text, one line per bucket and metric (default)
    #[default]
    Text,
    /// The decoded bucket tree as JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref host) = self.host {
            if host.trim().is_empty() {
                return Err("Host must not be empty".to_string());
            }
            if host.contains("://") {
                return Err("Host must not include a scheme; use --scheme".to_string());
            }
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if let Some(ref index) = self.index {
            if index.trim().is_empty() {
                return Err("Index name must not be empty".to_string());
            }
            if index.contains('/') || index.contains(' ') {
                return Err(format!("Invalid index name: '{}'", index));
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            host: None,
            port: None,
            scheme: None,
            index: None,
            cluster_name: None,
            timeout: None,
            config: None,
            output: None,
            format: OutputFormat::Text,
            placeholder: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "aggreport",
            "--host",
            "search.internal",
            "--port",
            "9243",
            "--scheme",
            "https",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.host.as_deref(), Some("search.internal"));
        assert_eq!(args.port, Some(9243));
        assert_eq!(args.scheme, Some(Scheme::Https));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_validation_default_ok() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_host_with_scheme() {
        let mut args = make_args();
        args.host = Some("http://localhost".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_values() {
        let mut args = make_args();
        args.port = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.index = Some("company/employee".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
