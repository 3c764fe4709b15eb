//! Partitioned sync loop
//!
//! Drives every configured stream through its partitions: resolve the
//! starting cursor, page to the signpost, bookmark after each parsed page,
//! then emit the records. Partitions are isolated; one coin failing never
//! blocks the rest of the run.

use futures_util::stream::{self, Stream, StreamExt};
use indicatif::ProgressBar;
use std::cmp::Ordering as CmpOrdering;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::client::{ClientError, CoinGeckoClient, RetryPolicy};
use crate::config::TapConfig;
use crate::output::RecordWriter;
use crate::shutdown::SharedShutdown;
use crate::state::{Bookmark, StateError, StateStore};
use crate::streams::{build_streams, Record, RestStream, SyncMode};
use crate::sync::cursor::resolve_start;
use crate::sync::paginator::PageTokenSequencer;
use crate::sync::throttle::Throttle;
use crate::sync::{PartitionOutcome, PartitionReport, SyncError, SyncReport};
use crate::{CursorValue, PageStep, Partition};

/// Run-global first-request flag.
///
/// The free-tier wait applies between consecutive requests of a run, never
/// before the first one, so a run of N requests observes exactly N-1 waits.
#[derive(Debug, Default)]
struct RunPacing {
    request_sent: AtomicBool,
}

impl RunPacing {
    /// Mark a request as issued; returns true when one came before it
    fn begin_request(&self) -> bool {
        self.request_sent.swap(true, Ordering::Relaxed)
    }

    fn reset(&self) {
        self.request_sent.store(false, Ordering::Relaxed);
    }
}

fn shutdown_requested(shutdown: &Option<SharedShutdown>) -> bool {
    shutdown
        .as_ref()
        .map(|s| s.is_shutdown_requested())
        .unwrap_or(false)
}

/// Issue one paced, retried request and parse the page it returns.
async fn fetch_page(
    client: &CoinGeckoClient,
    throttle: &Throttle,
    pacing: &RunPacing,
    stream: &dyn RestStream,
    partition: Option<&Partition>,
    token: Option<&CursorValue>,
) -> Result<Vec<Record>, SyncError> {
    if pacing.begin_request() {
        throttle.wait().await;
    }

    let path = stream.path(partition);
    let query = stream.query(token);
    let body = client.get(&path, query.as_slice()).await?;
    let records = stream.parse_page(partition, token, &body)?;
    Ok(records)
}

/// Pages of a cursor-paginated partition as a stream of `(token, records)`.
///
/// The first error is yielded once and ends the stream; the bookmark for a
/// failed page is never written because the consumer only sees parsed pages.
fn page_stream<'a>(
    client: &'a CoinGeckoClient,
    throttle: &'a Throttle,
    pacing: &'a RunPacing,
    rest: &'a dyn RestStream,
    partition: Option<&'a Partition>,
    start: CursorValue,
    signpost: CursorValue,
    step: PageStep,
) -> Pin<Box<dyn Stream<Item = Result<(CursorValue, Vec<Record>), SyncError>> + Send + 'a>> {
    let sequencer = PageTokenSequencer::new(start, signpost, step);

    let pages = stream::unfold((sequencer, false), move |(mut sequencer, done)| {
        async move {
            if done {
                return None;
            }

            let token = match sequencer.next() {
                Ok(Some(token)) => token,
                Ok(None) => return None,
                Err(e) => return Some((Err(SyncError::from(e)), (sequencer, true))),
            };

            match fetch_page(client, throttle, pacing, rest, partition, Some(&token)).await {
                Ok(records) => Some((Ok((token, records)), (sequencer, false))),
                Err(e) => Some((Err(e), (sequencer, true))),
            }
        }
    });

    Box::pin(pages)
}

/// Route a partition-scoped error into the report.
///
/// 404 is a soft skip and a malformed bookmark fails only its own partition.
/// State persistence, output and configuration errors bubble up and abort
/// the run.
fn record_partition_failure(err: SyncError, entry: &mut PartitionReport) -> Result<(), SyncError> {
    match err {
        SyncError::Client(ClientError::NotFound { resource }) => {
            warn!(resource = %resource, "Resource not found, skipping partition");
            entry.outcome = PartitionOutcome::SkippedNotFound;
            Ok(())
        }
        SyncError::State(state_err @ StateError::MalformedBookmark { .. }) => {
            error!(error = %state_err, "Stored bookmark is unusable");
            entry.outcome = PartitionOutcome::Failed;
            entry.error = Some(state_err.to_string());
            Ok(())
        }
        fatal @ (SyncError::State(_) | SyncError::Output(_) | SyncError::Config(_)) => Err(fatal),
        partition_fatal => {
            error!(error = %partition_fatal, "Partition sync failed");
            entry.outcome = PartitionOutcome::Failed;
            entry.error = Some(partition_fatal.to_string());
            Ok(())
        }
    }
}

/// Orchestrates a full sync run across streams and partitions
pub struct SyncRunner {
    streams: Vec<Arc<dyn RestStream>>,
    partitions: Vec<Partition>,
    client: CoinGeckoClient,
    throttle: Throttle,
    state: Box<dyn StateStore>,
    pacing: RunPacing,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl SyncRunner {
    /// Build a runner from a validated config and a state store
    pub fn new(config: &TapConfig, state: impl StateStore + 'static) -> Result<Self, SyncError> {
        let tier = config.tier()?;
        let streams = build_streams(config)?;
        let client = CoinGeckoClient::new(tier, config.api_key.clone(), RetryPolicy::default());
        let throttle = Throttle::from_profile(tier.profile(), config.wait_time_between_requests);

        Ok(Self {
            streams,
            partitions: config.partitions(),
            client,
            throttle,
            state: Box::new(state),
            pacing: RunPacing::default(),
            shutdown: None,
            progress: None,
        })
    }

    /// Replace the API client (tests script responses through this seam)
    pub fn with_client(mut self, client: CoinGeckoClient) -> Self {
        self.client = client;
        self
    }

    /// Attach a shared shutdown handle for cooperative cancellation
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Attach a progress bar ticked once per partition
    pub fn with_progress_bar(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The throttle derived from the configured tier
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Names of the streams this runner will sync, in sync order
    pub fn stream_names(&self) -> Vec<&'static str> {
        self.streams.iter().map(|s| s.name()).collect()
    }

    /// Consume the runner, returning the state store
    pub fn into_state(self) -> Box<dyn StateStore> {
        self.state
    }

    /// Sync every stream and partition, emitting to `writer`.
    ///
    /// Returns the per-partition report. Partition-scoped failures are
    /// recorded there; only configuration, state persistence and output
    /// errors end the run early.
    pub async fn sync_all(&mut self, writer: &mut dyn RecordWriter) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        self.pacing.reset();

        let streams = self.streams.clone();
        let partitions = self.partitions.clone();

        info!(
            streams = streams.len(),
            partitions = partitions.len(),
            "Starting sync run"
        );

        if let Some(progress) = &self.progress {
            let total: u64 = streams
                .iter()
                .map(|s| if s.partitioned() { partitions.len() as u64 } else { 1 })
                .sum();
            progress.set_length(total);
        }

        'streams: for stream in &streams {
            if shutdown_requested(&self.shutdown) {
                info!("Shutdown requested - stopping sync run");
                break;
            }

            writer.write_schema(stream.name(), &stream.schema(), stream.primary_keys())?;
            writer.flush()?;

            if stream.partitioned() {
                for partition in &partitions {
                    if shutdown_requested(&self.shutdown) {
                        info!("Shutdown requested - stopping sync run");
                        break 'streams;
                    }

                    let entry = self
                        .sync_partition(stream.as_ref(), Some(partition), writer)
                        .await?;
                    self.tick_progress(&entry);
                    let cancelled = entry.outcome == PartitionOutcome::Cancelled;
                    report.partitions.push(entry);
                    if cancelled {
                        break 'streams;
                    }
                }
            } else {
                let entry = self.sync_partition(stream.as_ref(), None, writer).await?;
                self.tick_progress(&entry);
                report.partitions.push(entry);
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }

        info!(
            partitions = report.partitions.len(),
            pages = report.total_pages(),
            records = report.total_records(),
            failed = report.failures().count(),
            "Sync run finished"
        );

        Ok(report)
    }

    fn tick_progress(&self, entry: &PartitionReport) {
        if let Some(progress) = &self.progress {
            progress.set_message(entry.label());
            progress.inc(1);
        }
    }

    async fn sync_partition(
        &mut self,
        stream: &dyn RestStream,
        partition: Option<&Partition>,
        writer: &mut dyn RecordWriter,
    ) -> Result<PartitionReport, SyncError> {
        let label = partition.map_or("-", |p| p.token.as_str());
        let span = info_span!("sync_partition", stream = stream.name(), partition = label);

        let entry = self
            .sync_partition_inner(stream, partition, writer)
            .instrument(span)
            .await?;
        crate::metrics::record_partition_outcome(stream.name(), entry.outcome.as_str());
        Ok(entry)
    }

    async fn sync_partition_inner(
        &mut self,
        stream: &dyn RestStream,
        partition: Option<&Partition>,
        writer: &mut dyn RecordWriter,
    ) -> Result<PartitionReport, SyncError> {
        let mut entry = PartitionReport::new(stream.name(), partition.map(|p| p.token.as_str()));

        let result = match stream.mode() {
            SyncMode::CursorPaginated { step } => {
                self.sync_cursor_pages(stream, partition, writer, step, &mut entry)
                    .await
            }
            SyncMode::PartitionSnapshot { once_per_day } => {
                self.sync_snapshot(stream, partition, writer, once_per_day, &mut entry)
                    .await
            }
            SyncMode::GlobalSnapshot => {
                self.sync_snapshot(stream, None, writer, false, &mut entry)
                    .await
            }
        };

        if let Err(err) = result {
            record_partition_failure(err, &mut entry)?;
        }

        if entry.outcome == PartitionOutcome::Completed {
            info!(
                pages = entry.pages,
                records = entry.records,
                "Partition sync finished"
            );
        }

        Ok(entry)
    }

    /// Page through a cursor-paginated partition up to the signpost.
    ///
    /// Each parsed page is bookmarked before it is emitted, so a crash
    /// between the two re-delivers the page on the next run rather than
    /// losing it.
    async fn sync_cursor_pages(
        &mut self,
        stream: &dyn RestStream,
        partition: Option<&Partition>,
        writer: &mut dyn RecordWriter,
        step: PageStep,
        entry: &mut PartitionReport,
    ) -> Result<(), SyncError> {
        let partition_key = partition.map_or("", |p| p.token.as_str());
        let replication_key = stream.replication().key();
        // Snapshotted once; records landing upstream mid-sync wait for the
        // next run.
        let signpost = stream.signpost();

        let start = match replication_key {
            Some(key) => resolve_start(
                self.state.as_ref(),
                stream.name(),
                key,
                step.cursor_kind(),
                partition_key,
                stream.start_cursor(),
            )?,
            None => stream.start_cursor(),
        };
        let Some(start) = start else {
            debug!("No start cursor configured, nothing to sync");
            return Ok(());
        };

        debug!(start = %start, signpost = %signpost, "Paginating partition");

        let Self {
            client,
            throttle,
            pacing,
            state,
            shutdown,
            ..
        } = self;
        let mut pages = page_stream(
            client, throttle, pacing, stream, partition, start, signpost, step,
        );

        loop {
            if shutdown_requested(shutdown) {
                info!("Shutdown requested - stopping between pages");
                entry.outcome = PartitionOutcome::Cancelled;
                return Ok(());
            }

            let Some(page) = pages.next().await else {
                break;
            };
            let (token, records) = page?;

            if let Some(key) = replication_key {
                state.set_bookmark(
                    stream.name(),
                    partition_key,
                    Bookmark::from_cursor(key, &token),
                )?;
            }

            entry.pages += 1;
            entry.records += records.len() as u64;
            crate::metrics::record_records_emitted(stream.name(), records.len() as u64);
            writer.write_records(stream.name(), &records)?;
            writer.flush()?;

            debug!(token = %token, records = records.len(), "Page bookmarked and emitted");
        }

        Ok(())
    }

    /// One-request sync for snapshot streams.
    ///
    /// `once_per_day` consults the partition's snapshot bookmark and skips
    /// when today's capture already happened.
    async fn sync_snapshot(
        &mut self,
        stream: &dyn RestStream,
        partition: Option<&Partition>,
        writer: &mut dyn RecordWriter,
        once_per_day: bool,
        entry: &mut PartitionReport,
    ) -> Result<(), SyncError> {
        let partition_key = partition.map_or("", |p| p.token.as_str());
        let replication_key = stream.replication().key();
        let signpost = stream.signpost();

        if once_per_day {
            if let Some(key) = replication_key {
                let captured = resolve_start(
                    self.state.as_ref(),
                    stream.name(),
                    key,
                    signpost.kind(),
                    partition_key,
                    None,
                )?;
                if let Some(captured) = captured {
                    if captured.compare(&signpost) != Some(CmpOrdering::Less) {
                        debug!(captured = %captured, "Snapshot already taken today, skipping");
                        return Ok(());
                    }
                }
            }
        }

        let records = fetch_page(
            &self.client,
            &self.throttle,
            &self.pacing,
            stream,
            partition,
            Some(&signpost),
        )
        .await?;

        if let Some(key) = replication_key {
            self.state.set_bookmark(
                stream.name(),
                partition_key,
                Bookmark::from_cursor(key, &signpost),
            )?;
        }

        entry.pages = 1;
        entry.records = records.len() as u64;
        crate::metrics::record_records_emitted(stream.name(), records.len() as u64);
        writer.write_records(stream.name(), &records)?;
        writer.flush()?;

        Ok(())
    }
}
