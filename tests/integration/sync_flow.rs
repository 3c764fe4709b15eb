//! End-to-end sync runs over a scripted transport.
//!
//! These tests drive the full runner: cursor resolution, pagination,
//! retries, bookmarking and JSONL emission, with only the HTTP layer
//! replaced by a scripted double.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use coingecko_extractor::client::{ClientError, RetryPolicy};
use coingecko_extractor::output::JsonlWriter;
use coingecko_extractor::shutdown::ShutdownCoordinator;
use coingecko_extractor::state::{MemoryStateStore, StateStore};
use coingecko_extractor::sync::{PartitionOutcome, SyncReport, SyncRunner};
use coingecko_extractor::TapConfig;

use crate::support::{
    days_ago, fast_retry, history_body, scripted_client, scripted_client_for, tap_config,
    trending_body, yesterday, CaptureBuffer, ScriptedTransport,
};

/// Build a runner over the scripted transport, sync, and hand back the
/// report, the captured output and the final state.
async fn run_sync(
    config: &TapConfig,
    transport: &Arc<ScriptedTransport>,
    state: MemoryStateStore,
) -> (SyncReport, CaptureBuffer, Box<dyn StateStore>) {
    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());

    let mut runner = SyncRunner::new(config, state)
        .unwrap()
        .with_client(scripted_client(transport.clone()));
    let report = runner.sync_all(&mut writer).await.unwrap();

    (report, buf, runner.into_state())
}

#[tokio::test]
async fn test_full_sync_pages_to_the_signpost() {
    let start = days_ago(4);
    let config = tap_config(&["bitcoin"], start, &["token_history"]);
    let transport = Arc::new(ScriptedTransport::always(history_body()));

    let (report, buf, state) = run_sync(&config, &transport, MemoryStateStore::new()).await;

    // start is exclusive, yesterday is inclusive: three daily pages
    assert_eq!(report.partitions.len(), 1);
    let entry = &report.partitions[0];
    assert_eq!(entry.outcome, PartitionOutcome::Completed);
    assert_eq!(entry.pages, 3);
    assert_eq!(entry.records, 3);
    assert_eq!(report.total_records(), 3);

    let lines = buf.lines();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["type"], "SCHEMA");
    assert_eq!(lines[0]["stream"], "token_history");
    assert_eq!(lines[0]["key_properties"], json!(["date", "token"]));
    for (i, line) in lines[1..].iter().enumerate() {
        assert_eq!(line["type"], "RECORD");
        assert_eq!(line["stream"], "token_history");
        assert_eq!(
            line["record"]["date"],
            days_ago(3 - i as u64).format("%Y-%m-%d").to_string()
        );
        assert_eq!(line["record"]["token"], "bitcoin");
        assert_eq!(line["record"]["name"], "Bitcoin");
        assert_eq!(line["record"]["price_usd"], 43_250.12);
    }

    // Every request hit the public-tier history endpoint, dated per page,
    // unauthenticated.
    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert_eq!(
            call.url,
            "https://api.coingecko.com/api/v3/coins/bitcoin/history"
        );
        assert_eq!(call.param("localization"), Some("false"));
        assert!(call.header("x-cg-demo-api-key").is_none());
    }
    assert_eq!(
        calls[0].param("date"),
        Some(days_ago(3).format("%d-%m-%Y").to_string().as_str())
    );

    let bookmark = state.bookmark("token_history", "bitcoin").unwrap();
    assert_eq!(bookmark.replication_key, "date");
    assert_eq!(
        bookmark.replication_key_value,
        json!(yesterday().format("%Y-%m-%d").to_string())
    );
}

#[tokio::test]
async fn test_not_found_skips_partition_and_continues() {
    let config = tap_config(&["delisted-coin", "bitcoin"], days_ago(2), &["token_history"]);
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        Err(ClientError::NotFound {
            resource: "/coins/delisted-coin/history".to_string(),
        }),
        Ok(history_body()),
    ]));

    let (report, _, state) = run_sync(&config, &transport, MemoryStateStore::new()).await;

    assert_eq!(report.partitions.len(), 2);
    assert_eq!(
        report.partitions[0].outcome,
        PartitionOutcome::SkippedNotFound
    );
    assert_eq!(report.partitions[0].pages, 0);
    assert_eq!(report.partitions[1].outcome, PartitionOutcome::Completed);
    assert_eq!(report.partitions[1].pages, 1);
    assert!(!report.has_failures());

    // 404 is not retried, so each partition cost exactly one request
    assert_eq!(transport.call_count(), 2);
    assert!(state.bookmark("token_history", "delisted-coin").is_none());
    assert!(state.bookmark("token_history", "bitcoin").is_some());
}

#[tokio::test]
async fn test_parse_failure_fails_partition_only() {
    let config = tap_config(&["bitcoin", "ethereum"], days_ago(2), &["token_history"]);
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        Ok(json!([1, 2, 3])),
        Ok(history_body()),
    ]));

    let (report, buf, state) = run_sync(&config, &transport, MemoryStateStore::new()).await;

    let failed = &report.partitions[0];
    assert_eq!(failed.outcome, PartitionOutcome::Failed);
    assert!(failed.error.as_deref().unwrap().contains("parse error"));
    assert_eq!(report.partitions[1].outcome, PartitionOutcome::Completed);
    assert!(report.has_failures());

    // The malformed page was neither bookmarked nor emitted
    assert!(state.bookmark("token_history", "bitcoin").is_none());
    assert!(state.bookmark("token_history", "ethereum").is_some());
    let records: Vec<_> = buf
        .lines()
        .into_iter()
        .filter(|l| l["type"] == "RECORD")
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["record"]["token"], "ethereum");
}

#[tokio::test]
async fn test_rate_limited_requests_are_retried() {
    let config = tap_config(&["bitcoin"], days_ago(2), &["token_history"]);
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        Err(ClientError::RateLimited),
        Err(ClientError::RateLimited),
        Err(ClientError::RateLimited),
        Ok(history_body()),
    ]));

    let (report, _, state) = run_sync(&config, &transport, MemoryStateStore::new()).await;

    assert_eq!(transport.call_count(), 4);
    assert_eq!(report.partitions[0].outcome, PartitionOutcome::Completed);
    assert_eq!(report.partitions[0].pages, 1);
    assert!(state.bookmark("token_history", "bitcoin").is_some());
}

#[tokio::test]
async fn test_retry_exhaustion_fails_the_partition() {
    let config = tap_config(&["bitcoin"], days_ago(2), &["token_history"]);
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        Err(ClientError::ServerError { status: 503 }),
        Err(ClientError::ServerError { status: 503 }),
        Err(ClientError::ServerError { status: 503 }),
    ]));

    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());
    let client = scripted_client_for(
        transport.clone(),
        config.tier().unwrap(),
        None,
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
    );
    let mut runner = SyncRunner::new(&config, MemoryStateStore::new())
        .unwrap()
        .with_client(client);
    let report = runner.sync_all(&mut writer).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    let entry = &report.partitions[0];
    assert_eq!(entry.outcome, PartitionOutcome::Failed);
    assert!(entry.error.as_deref().unwrap().contains("server error"));
}

#[tokio::test]
async fn test_global_snapshot_stream_takes_no_bookmark() {
    let config = tap_config(&["bitcoin"], yesterday(), &["trending"]);
    let transport = Arc::new(ScriptedTransport::always(trending_body()));

    let (report, buf, state) = run_sync(&config, &transport, MemoryStateStore::new()).await;

    // One global snapshot request, regardless of configured tokens
    assert_eq!(transport.call_count(), 1);
    assert_eq!(
        transport.calls()[0].url,
        "https://api.coingecko.com/api/v3/search/trending"
    );

    assert_eq!(report.partitions.len(), 1);
    let entry = &report.partitions[0];
    assert!(entry.partition.is_none());
    assert_eq!(entry.outcome, PartitionOutcome::Completed);
    assert_eq!(entry.records, 2);

    let lines = buf.lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["record"]["coin_id"], "pepe");
    assert_eq!(lines[1]["record"]["score"], 0);
    assert_eq!(lines[2]["record"]["coin_id"], "sui");
    assert_eq!(lines[2]["record"]["score"], 1);

    // Full-table snapshots never write state
    assert!(state.bookmark("trending", "").is_none());
}

#[tokio::test]
async fn test_shutdown_between_pages_cancels_cleanly() {
    let start = days_ago(4);
    let config = tap_config(&["bitcoin"], start, &["token_history"]);
    let shutdown = ShutdownCoordinator::shared();
    let transport = Arc::new(
        ScriptedTransport::always(history_body()).with_shutdown_after(shutdown.clone(), 1),
    );

    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());
    let client = scripted_client_for(transport.clone(), config.tier().unwrap(), None, fast_retry());
    let mut runner = SyncRunner::new(&config, MemoryStateStore::new())
        .unwrap()
        .with_client(client)
        .with_shutdown(shutdown);
    let report = runner.sync_all(&mut writer).await.unwrap();

    // The in-flight page finished and was bookmarked; no further request
    // was issued.
    assert_eq!(transport.call_count(), 1);
    assert_eq!(report.partitions.len(), 1);
    let entry = &report.partitions[0];
    assert_eq!(entry.outcome, PartitionOutcome::Cancelled);
    assert_eq!(entry.pages, 1);
    assert!(report.cancelled());

    let state = runner.into_state();
    let bookmark = state.bookmark("token_history", "bitcoin").unwrap();
    assert_eq!(
        bookmark.replication_key_value,
        json!(days_ago(3).format("%Y-%m-%d").to_string())
    );
}
