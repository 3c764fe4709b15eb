//! Binary-level CLI tests.
//!
//! Everything here runs the compiled binary against local files only; no
//! test in this module talks to the API.

use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

use coingecko_extractor::state::{Bookmark, FileStateStore, StateStore};

fn extractor() -> Command {
    Command::cargo_bin("coingecko-extractor").unwrap()
}

fn write_config(dir: &TempDir, contents: &str) -> String {
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_help_lists_commands() {
    let output = extractor().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("sync"));
    assert!(stdout.contains("streams"));
    assert!(stdout.contains("validate"));
}

#[test]
fn test_version_flag() {
    let output = extractor().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("coingecko-extractor"));
}

#[test]
fn test_streams_catalog_as_json() {
    let output = extractor()
        .args(["streams", "--output-format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let catalog: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = catalog
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"token_history"));
    assert!(names.contains(&"trending"));
    assert!(names.contains(&"new_listings"));
}

#[test]
fn test_streams_catalog_human_output() {
    let output = extractor().arg("streams").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("token_history"));
    assert!(stdout.contains("streams total"));
}

#[test]
fn test_validate_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"{ "token": ["bitcoin"], "start_date": "2024-01-01" }"#,
    );

    let output = extractor()
        .args(["validate", "config", &config])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Valid config"));
    assert!(stdout.contains("token_history"));
    // Pro-only streams are not selected by a public-tier config
    assert!(!stdout.contains("new_listings"));
}

#[test]
fn test_validate_rejects_empty_token_list() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, r#"{ "token": [] }"#);

    extractor()
        .args(["validate", "config", &config])
        .assert()
        .failure();
}

#[test]
fn test_validate_state_reports_bookmarks() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    {
        let mut store = FileStateStore::open(&path).unwrap();
        store
            .set_bookmark(
                "token_history",
                "bitcoin",
                Bookmark::new("date", json!("2024-01-05")),
            )
            .unwrap();
    }

    let output = extractor()
        .args(["validate", "state", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("token_history"));
    assert!(stdout.contains("1 bookmark(s)"));
}

#[test]
fn test_validate_state_tolerates_a_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-such-state.json");

    let output = extractor()
        .args(["validate", "state", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .contains("No state file found"));
}

#[test]
fn test_sync_fails_cleanly_without_config_file() {
    extractor()
        .args(["sync", "--config", "/nonexistent/config.json"])
        .assert()
        .failure();
}
