//! Daily ingestion pipeline
//!
//! One run fetches the configured search, stores the raw snapshot, then
//! normalizes, splits and uploads the five tables for the run's date:
//!
//! ```text
//! Adzuna ──fetch──▶ raw/adzuna/ingest_date=D/adzuna_jobs_HHMMSS.json
//!                     │
//!                     └─normalize─▶ split ─▶ processed/{table}/ingest_date=D/{table}_D.{ext}
//! ```
//!
//! A run is idempotent per date. The `jobs` table is uploaded last and marks
//! the partition complete: when it exists for the date, in any table format,
//! the run is skipped unless `skip_existing` is off. A run that fails part
//! way never writes the marker, so the next attempt redoes the date.

use crate::adzuna::AdzunaClient;
use crate::config::OutputConfig;
use crate::encode::{encode, encode_raw, TableFormat};
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::stats::IngestStats;
use crate::storage::{layout, put_with_retry, ObjectStore};
use crate::tables::{split_tables, JOBS};
use crate::transform::normalize;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

const RAW_CONTENT_TYPE: &str = "application/json";

pub struct Pipeline {
    client: AdzunaClient,
    store: Arc<dyn ObjectStore>,
    output: OutputConfig,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(client: AdzunaClient, store: Arc<dyn ObjectStore>, output: OutputConfig) -> Self {
        let retry = client.config().retry;
        Self {
            client,
            store,
            output,
            retry,
        }
    }

    /// Use a different retry policy for uploads than for fetches
    pub fn with_upload_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Run the pipeline for a run started at `run_ts`
    pub async fn run(&self, run_ts: DateTime<Utc>) -> Result<IngestStats> {
        let mut stats = IngestStats::new(run_ts);
        let span = info_span!("ingest_run", run_id = %stats.run_id, date = %stats.ingest_date);

        self.run_inner(run_ts, &mut stats).instrument(span).await?;

        stats.complete();
        info!(
            run_id = %stats.run_id,
            skipped = stats.skipped,
            postings = stats.unique_postings,
            uploads = stats.uploads.len(),
            bytes = stats.bytes_uploaded,
            duration_secs = stats.duration_secs,
            "Ingestion run finished"
        );
        Ok(stats)
    }

    async fn run_inner(&self, run_ts: DateTime<Utc>, stats: &mut IngestStats) -> Result<()> {
        let date = run_ts.date_naive();

        // ====================================================================
        // Idempotency check
        // ====================================================================

        if self.output.skip_existing {
            for format in TableFormat::ALL {
                let marker = layout::table_key(JOBS, date, format);
                if self.store.exists(&marker).await? {
                    info!(key = %marker, "Partition already ingested, skipping run");
                    stats.skipped = true;
                    return Ok(());
                }
            }
        }

        // ====================================================================
        // Extract
        // ====================================================================

        let outcome = self.client.fetch_jobs().await?;
        stats.pages_fetched = outcome.pages_fetched;
        stats.pages_failed = outcome.pages_failed.clone();
        stats.total_available = outcome.total_available;
        stats.raw_records = outcome.records.len();

        let raw_key = layout::raw_key(run_ts);
        let raw = encode_raw(&outcome.records)?;
        let upload =
            put_with_retry(self.store.as_ref(), &self.retry, &raw_key, raw, RAW_CONTENT_TYPE)
                .await?;
        info!(uri = %upload.uri, records = stats.raw_records, "Stored raw snapshot");
        stats.record_upload(upload);

        if outcome.records.is_empty() {
            warn!("No postings returned, tables not written");
            return Ok(());
        }

        // ====================================================================
        // Transform
        // ====================================================================

        let normalized = normalize(&outcome.records, run_ts);
        stats.unique_postings = normalized.postings.len();
        stats.duplicates_dropped = normalized.duplicates;
        stats.malformed_records = normalized.malformed;

        let tables = split_tables(&normalized.postings);
        if tables.is_empty() {
            warn!(
                malformed = normalized.malformed,
                "No usable postings after normalization, tables not written"
            );
            return Ok(());
        }

        // ====================================================================
        // Load
        // ====================================================================

        let format = self.output.format;
        let mut frames = tables.frames();
        // The jobs table goes last so it only exists once every table landed
        frames.sort_by_key(|frame| frame.name == JOBS);

        for frame in frames {
            let key = layout::table_key(frame.name, date, format);
            let rows = frame.num_rows();
            let bytes = encode(&frame, format)?;

            let upload = put_with_retry(
                self.store.as_ref(),
                &self.retry,
                &key,
                bytes,
                format.content_type(),
            )
            .await?;

            info!(table = frame.name, rows, uri = %upload.uri, "Uploaded table");
            stats.table_rows.insert(frame.name.to_string(), rows);
            stats.record_upload(upload);
        }

        Ok(())
    }
}
