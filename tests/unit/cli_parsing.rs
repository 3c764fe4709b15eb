//! Unit tests for CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

use coingecko_extractor::cli::validate::ValidateTarget;
use coingecko_extractor::cli::{Cli, Commands, OutputFormat};

#[test]
fn test_sync_requires_config_flag() {
    let result = Cli::try_parse_from(vec!["coingecko-extractor", "sync"]);
    assert!(result.is_err(), "sync without --config should be rejected");
}

#[test]
fn test_sync_defaults() {
    let cli = Cli::parse_from(vec![
        "coingecko-extractor",
        "sync",
        "--config",
        "config.json",
    ]);

    assert!(matches!(cli.output_format, OutputFormat::Human));
    assert!(cli.metrics_addr.is_none());

    let Commands::Sync(args) = cli.command else {
        panic!("expected the sync subcommand");
    };
    assert_eq!(args.config, PathBuf::from("config.json"));
    assert!(args.state.is_none());
    assert!(args.output.is_none());
    assert!(args.select.is_empty());
}

#[test]
fn test_sync_accepts_repeated_select() {
    let cli = Cli::parse_from(vec![
        "coingecko-extractor",
        "sync",
        "--config",
        "config.json",
        "--state",
        "state.json",
        "--select",
        "token_history",
        "--select",
        "trending",
    ]);

    let Commands::Sync(args) = cli.command else {
        panic!("expected the sync subcommand");
    };
    assert_eq!(args.state, Some(PathBuf::from("state.json")));
    assert_eq!(args.select, vec!["token_history", "trending"]);
}

#[test]
fn test_global_flags_parse_after_the_subcommand() {
    let cli = Cli::parse_from(vec![
        "coingecko-extractor",
        "sync",
        "--config",
        "config.json",
        "--output-format",
        "json",
        "--metrics-addr",
        "127.0.0.1:9598",
    ]);

    assert!(matches!(cli.output_format, OutputFormat::Json));
    assert_eq!(
        cli.metrics_addr,
        Some("127.0.0.1:9598".parse().unwrap())
    );
}

#[test]
fn test_invalid_output_format_rejected() {
    let result = Cli::try_parse_from(vec![
        "coingecko-extractor",
        "streams",
        "--output-format",
        "yaml",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_validate_subcommands_parse() {
    let cli = Cli::parse_from(vec![
        "coingecko-extractor",
        "validate",
        "config",
        "config.json",
    ]);
    let Commands::Validate(cmd) = cli.command else {
        panic!("expected the validate subcommand");
    };
    assert!(matches!(
        cmd.target,
        ValidateTarget::Config { ref path } if path == &PathBuf::from("config.json")
    ));

    let cli = Cli::parse_from(vec![
        "coingecko-extractor",
        "validate",
        "state",
        "state.json",
    ]);
    let Commands::Validate(cmd) = cli.command else {
        panic!("expected the validate subcommand");
    };
    assert!(matches!(cmd.target, ValidateTarget::State { .. }));
}

#[test]
fn test_streams_command_parses() {
    let cli = Cli::parse_from(vec!["coingecko-extractor", "streams"]);
    assert!(matches!(cli.command, Commands::Streams(_)));
}
