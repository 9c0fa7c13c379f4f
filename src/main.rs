//! aggreport - nested aggregation reports from a search cluster
//!
//! Sends one aggregation-only search (by default: employees grouped by
//! country, then by year of joining, with the average salary of each year)
//! and prints the bucket tree.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure; the message names the stage (config, connect, query,
//!       parse-response, output)

mod aggregation;
mod cli;
mod client;
mod config;
mod error;
mod report;
mod reporter;

use aggregation::{build_search_body, AggregationSpec};
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use client::HttpTransport;
use config::{Config, DEFAULT_CONFIG_FILE};
use error::{ReportError, Stage};
use indicatif::{ProgressBar, ProgressStyle};
use report::RenderOptions;
use reporter::{AggregationReporter, ReportRequest};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("aggreport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        let stage = failure_stage(&e);
        error!("Run failed during {}: {:#}", stage, e);
        eprintln!("Error ({}): {:#}", stage, e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .aggreport.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging on stderr so stdout only carries the report.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Connect, query, render, write.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args, Path::new("."))?;
    config.merge_with_args(&args);
    config.cluster.validate()?;

    if args.dry_run {
        return handle_dry_run(&config);
    }

    let transport = HttpTransport::new(&config.cluster)?;
    let reporter = AggregationReporter::new(transport, ReportRequest::from(&config.query));

    let spinner = query_spinner(args.quiet, &config);
    let outcome = reporter.run().await;
    spinner.finish_and_clear();
    let tree = outcome?;

    let output = match args.format {
        OutputFormat::Text => {
            report::generate_text_report(&tree, &RenderOptions::from(&config.report))
        }
        OutputFormat::Json => {
            let mut json = report::generate_json_report(&tree)?;
            json.push('\n');
            json
        }
    };

    write_output(args.output.as_deref(), &output)?;
    Ok(())
}

/// Handle --dry-run: print the request that would be sent, without connecting.
fn handle_dry_run(config: &Config) -> Result<()> {
    AggregationSpec::validate_all(&config.query.aggregations)?;

    let body = build_search_body(&config.query.aggregations);
    println!(
        "POST {}/{}/_search",
        config.cluster.endpoint(),
        config.query.index
    );
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn query_spinner(quiet: bool, config: &Config) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Querying {} on {}",
        config.query.index,
        config.cluster.endpoint()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Write the report to `path`, or to stdout.
fn write_output(path: Option<&Path>, content: &str) -> std::result::Result<(), ReportError> {
    match path {
        Some(path) => {
            std::fs::write(path, content).map_err(|source| ReportError::Output {
                path: path.to_path_buf(),
                source,
            })?;
            info!("Report saved to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .and_then(|_| handle.flush())
                .map_err(|source| ReportError::Output {
                    path: "<stdout>".into(),
                    source,
                })?;
        }
    }
    Ok(())
}

/// Which stage a failed run stopped in.
fn failure_stage(e: &anyhow::Error) -> Stage {
    e.downcast_ref::<ReportError>()
        .map(ReportError::stage)
        .unwrap_or(Stage::Config)
}

/// Load configuration from `--config`, from `.aggreport.toml` in `dir`, or use defaults.
///
/// A default file that exists but does not parse is an error.
fn load_config(args: &Args, dir: &Path) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default_in(dir)
        .with_context(|| format!("Invalid {}", DEFAULT_CONFIG_FILE))?
    {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_failure_stage() {
        let connect: anyhow::Error = ReportError::ConnectionFailure {
            endpoint: "http://localhost:9200".to_string(),
            reason: "host unreachable".to_string(),
        }
        .into();
        assert_eq!(failure_stage(&connect), Stage::Connect);

        let parse: anyhow::Error = ReportError::MissingAggregationKey {
            key: "avg_salary".to_string(),
            path: "aggregations".to_string(),
        }
        .into();
        assert_eq!(failure_stage(&parse), Stage::ParseResponse);

        assert_eq!(failure_stage(&anyhow::anyhow!("bad toml")), Stage::Config);
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");

        write_output(Some(&path), "US:8\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "US:8\n");
    }

    #[test]
    fn test_write_output_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.txt");

        let err = write_output(Some(&path), "x").unwrap_err();
        assert_eq!(err.stage(), Stage::Output);
    }

    #[test]
    fn test_broken_default_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[query]\nindex = \"staff\"\n\n[[query.aggregations]]\nname = \"by_office\"\ntype = \"termz\"\nfield = \"office\"\n",
        )
        .unwrap();

        let err = load_config(&make_args(), dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(DEFAULT_CONFIG_FILE));
        assert_eq!(failure_stage(&err), Stage::Config);
    }

    #[test]
    fn test_default_config_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(&make_args(), dir.path()).unwrap().query.index, "company");

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "[query]\nindex = \"staff\"\n").unwrap();
        assert_eq!(load_config(&make_args(), dir.path()).unwrap().query.index, "staff");
    }
}
