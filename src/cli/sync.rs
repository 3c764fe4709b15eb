//! Sync command implementation

use crate::config::TapConfig;
use crate::output::JsonlWriter;
use crate::shutdown::SharedShutdown;
use crate::state::{FileStateStore, MemoryStateStore};
use crate::sync::{SyncReport, SyncRunner};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use super::CliError;

/// CoinGecko extractor CLI
#[derive(Parser, Debug)]
#[command(name = "coingecko-extractor")]
#[command(about = "Extract CoinGecko market data incrementally with resumable syncs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for command summaries (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Bind address for a Prometheus metrics endpoint (e.g. 127.0.0.1:9598)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an incremental sync
    Sync(SyncArgs),

    /// List the streams this extractor can serve
    Streams(super::StreamsCommand),

    /// Validate a config file or bookmark state file
    Validate(super::ValidateCommand),
}

/// Sync command arguments
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Path to the config JSON file
    #[arg(long)]
    pub config: PathBuf,

    /// Bookmark state file; without it the run starts fresh and persists nothing
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Write the record stream to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Sync only the named stream (repeatable); overrides `streams` in the config
    #[arg(long = "select", value_name = "STREAM")]
    pub select: Vec<String>,
}

/// Output format options
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl SyncArgs {
    /// Run one sync pass over every selected stream
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let mut config = TapConfig::from_file(&self.config)?;
        if !self.select.is_empty() {
            config.streams = Some(self.select.clone());
        }

        let mut runner = match &self.state {
            Some(path) => SyncRunner::new(&config, FileStateStore::open(path)?)?,
            None => {
                warn!("No --state file given; bookmarks will not survive this run");
                SyncRunner::new(&config, MemoryStateStore::new())?
            }
        };
        runner = runner
            .with_shutdown(shutdown)
            .with_progress_bar(create_progress_bar());

        let mut writer = match &self.output {
            Some(path) => JsonlWriter::to_file(path)?,
            None => JsonlWriter::stdout(),
        };

        info!(config = %self.config.display(), "Starting sync");
        let report = runner.sync_all(&mut writer).await?;

        match cli.output_format {
            OutputFormat::Json => output_json(&report),
            OutputFormat::Human => output_human(&report),
        }

        Ok(())
    }
}

// ─── Summary output ──────────────────────────────────────────────────────────
//
// Stdout carries the record stream, so summaries always go to stderr.

/// Print the run summary as a single JSON line
fn output_json(report: &SyncReport) {
    let failed: Vec<_> = report
        .failures()
        .map(|entry| {
            json!({
                "partition": entry.label(),
                "error": entry.error,
            })
        })
        .collect();

    let output = json!({
        "success": !report.has_failures() && !report.cancelled(),
        "cancelled": report.cancelled(),
        "partitions": report.partitions.len(),
        "pages": report.total_pages(),
        "records": report.total_records(),
        "failed": failed,
    });

    eprintln!("{}", serde_json::to_string(&output).unwrap());
}

/// Print the run summary in human-readable form
fn output_human(report: &SyncReport) {
    if report.cancelled() {
        eprintln!("\nSync cancelled - progress saved through the last completed page");
    } else if report.has_failures() {
        eprintln!("\nSync completed with failures");
    } else {
        eprintln!("\nSync completed successfully!");
    }
    eprintln!("Partitions: {}", report.partitions.len());
    eprintln!("Pages: {}", report.total_pages());
    eprintln!("Records: {}", report.total_records());

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        eprintln!("Failed partitions:");
        for entry in failures {
            eprintln!(
                "  {} - {}",
                entry.label(),
                entry.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

// ─── Progress bar ────────────────────────────────────────────────────────────

/// Create the partition progress bar; the runner sets its length at start
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb
}
