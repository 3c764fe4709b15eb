//! Validation subcommand

use clap::Parser;
use std::path::{Path, PathBuf};

use super::CliError;
use crate::config::TapConfig;
use crate::state::FileStateStore;
use crate::streams::build_streams;

/// Validate command for checking config and bookmark state files
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// What to validate
    #[command(subcommand)]
    pub target: ValidateTarget,
}

/// Target type for validation
#[derive(clap::Subcommand, Debug)]
pub enum ValidateTarget {
    /// Validate a config file and show what it would sync
    Config {
        /// Path to the config JSON file
        path: PathBuf,
    },
    /// Validate a bookmark state file
    State {
        /// Path to the state JSON file
        path: PathBuf,
    },
}

impl ValidateCommand {
    /// Execute the validation command
    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.target {
            ValidateTarget::Config { path } => self.validate_config(path),
            ValidateTarget::State { path } => self.validate_state(path),
        }
    }

    /// Parse a config and report the tier and streams it selects
    fn validate_config(&self, path: &Path) -> Result<(), CliError> {
        match TapConfig::from_file(path) {
            Ok(config) => {
                let tier = config.tier()?;
                let streams = build_streams(&config)?;
                println!("Valid config: {}", path.display());
                println!("  Tier: {}", tier);
                println!("  Tokens: {}", config.tokens.len());
                println!("  Streams:");
                for stream in &streams {
                    println!("    - {}", stream.name());
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("Invalid config: {}", e);
                Err(CliError::from(e))
            }
        }
    }

    /// Open a state file and report the bookmarks it holds
    fn validate_state(&self, path: &Path) -> Result<(), CliError> {
        if !path.exists() {
            println!("No state file found at {}", path.display());
            return Ok(());
        }

        match FileStateStore::open(path) {
            Ok(store) => {
                let summary = store.stream_summary();
                if summary.is_empty() {
                    println!("Valid state file with no bookmarks yet");
                } else {
                    println!("Valid state file: {}", path.display());
                    for (stream, partitions) in summary {
                        println!("  {} - {} bookmark(s)", stream, partitions);
                    }
                }
                Ok(())
            }
            Err(e) => {
                eprintln!("Invalid state file: {}", e);
                Err(CliError::from(e))
            }
        }
    }
}
