//! Main entry point for the coingecko-extractor CLI

use clap::Parser;
use coingecko_extractor::cli::{Cli, Commands};
use coingecko_extractor::metrics;
use coingecko_extractor::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting.
///
/// Logs go to stderr so stdout stays reserved for the record stream.
fn init_tracing() {
    // LOG_FORMAT=json switches to structured output
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coingecko_extractor=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C requests a graceful stop at the next page boundary
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing the current page...");
                shutdown.request_shutdown();
            }
        }
    });

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr).await {
            error!("Failed to initialize metrics: {}", e);
            std::process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Sync(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Streams(ref streams_cmd) => streams_cmd.execute(&cli).await,
        Commands::Validate(ref validate_cmd) => validate_cmd
            .execute()
            .await
            .map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
