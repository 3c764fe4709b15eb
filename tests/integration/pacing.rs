//! Request pacing across a sync run.
//!
//! Runs under paused tokio time, so the waits are measured exactly: a run
//! of N requests on the public tier observes N-1 waits, and the pro tier
//! observes none.

use std::sync::Arc;
use std::time::Duration;

use coingecko_extractor::output::JsonlWriter;
use coingecko_extractor::state::MemoryStateStore;
use coingecko_extractor::sync::SyncRunner;

use crate::support::{
    days_ago, fast_retry, history_body, paced_config, pro_config, scripted_client,
    scripted_client_for, CaptureBuffer, ScriptedTransport,
};

#[tokio::test(start_paused = true)]
async fn test_public_tier_waits_between_requests() {
    // Three daily pages at 5s spacing: the first request is free, the other
    // two wait.
    let config = paced_config(&["bitcoin"], days_ago(4), &["token_history"], 5);
    let transport = Arc::new(ScriptedTransport::always(history_body()));

    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());
    let mut runner = SyncRunner::new(&config, MemoryStateStore::new())
        .unwrap()
        .with_client(scripted_client(transport.clone()));

    let before = tokio::time::Instant::now();
    let report = runner.sync_all(&mut writer).await.unwrap();

    assert_eq!(before.elapsed(), Duration::from_secs(10));
    assert_eq!(report.total_pages(), 3);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_single_request_run_never_waits() {
    let config = paced_config(&["bitcoin"], days_ago(2), &["token_history"], 5);
    let transport = Arc::new(ScriptedTransport::always(history_body()));

    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());
    let mut runner = SyncRunner::new(&config, MemoryStateStore::new())
        .unwrap()
        .with_client(scripted_client(transport.clone()));

    let before = tokio::time::Instant::now();
    runner.sync_all(&mut writer).await.unwrap();

    assert_eq!(before.elapsed(), Duration::ZERO);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pacing_spans_partitions() {
    // Two partitions of one page each make two requests in the run, so the
    // second partition's first request still waits.
    let config = paced_config(&["bitcoin", "ethereum"], days_ago(2), &["token_history"], 5);
    let transport = Arc::new(ScriptedTransport::always(history_body()));

    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());
    let mut runner = SyncRunner::new(&config, MemoryStateStore::new())
        .unwrap()
        .with_client(scripted_client(transport.clone()));

    let before = tokio::time::Instant::now();
    let report = runner.sync_all(&mut writer).await.unwrap();

    assert_eq!(before.elapsed(), Duration::from_secs(5));
    assert_eq!(report.partitions.len(), 2);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pro_tier_ignores_the_configured_wait() {
    let config = pro_config(&["bitcoin"], days_ago(4), &["token_history"], 5);
    let transport = Arc::new(ScriptedTransport::always(history_body()));

    let buf = CaptureBuffer::default();
    let mut writer = JsonlWriter::from_writer(buf.clone());
    let client = scripted_client_for(
        transport.clone(),
        config.tier().unwrap(),
        Some("CG-test-key"),
        fast_retry(),
    );
    let mut runner = SyncRunner::new(&config, MemoryStateStore::new())
        .unwrap()
        .with_client(client);

    assert!(!runner.throttle().is_paced());
    let envelope = runner.throttle().concurrency_envelope().unwrap();
    assert_eq!(envelope.concurrency, 5);
    assert_eq!(envelope.max_requests_per_window, 10);
    assert_eq!(envelope.window, Duration::from_secs(1));

    let before = tokio::time::Instant::now();
    let report = runner.sync_all(&mut writer).await.unwrap();

    assert_eq!(before.elapsed(), Duration::ZERO);
    assert_eq!(report.total_pages(), 3);

    // Pro requests go to the pro host with the pro auth header
    let calls = transport.calls();
    assert_eq!(
        calls[0].url,
        "https://pro-api.coingecko.com/api/v3/coins/bitcoin/history"
    );
    assert_eq!(calls[0].header("x-cg-pro-api-key"), Some("CG-test-key"));
}
