//! CLI command for listing available streams

use crate::streams::STREAM_CATALOG;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use super::{Cli, OutputFormat};

/// Streams subcommand
#[derive(Debug, Args)]
pub struct StreamsCommand {}

impl StreamsCommand {
    /// Print the stream catalog
    pub async fn execute(&self, cli: &Cli) -> Result<()> {
        match cli.output_format {
            OutputFormat::Json => {
                let listing: Vec<_> = STREAM_CATALOG
                    .iter()
                    .map(|info| {
                        json!({
                            "name": info.name,
                            "mode": info.mode,
                            "cursor": info.cursor,
                            "requires": info.requires,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&listing)
                        .context("Failed to serialize stream catalog to JSON")?
                );
            }
            OutputFormat::Human => {
                println!("Available streams:\n");
                for info in STREAM_CATALOG {
                    let requires = if info.requires.is_empty() {
                        String::new()
                    } else {
                        format!("  (requires {})", info.requires)
                    };
                    println!(
                        "  {:<24} {:<34} cursor: {}{}",
                        info.name, info.mode, info.cursor, requires
                    );
                }
                println!("\n{} streams total", STREAM_CATALOG.len());
            }
        }

        Ok(())
    }
}
