//! Run statistics

use crate::storage::UploadResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Statistics collected during one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IngestStats {
    /// Unique id of the run, used to correlate log lines
    pub run_id: Uuid,
    /// Partition date the run wrote to
    pub ingest_date: String,
    /// The partition already existed and nothing was fetched
    pub skipped: bool,
    pub pages_fetched: u32,
    /// Pages skipped after exhausting retries
    pub pages_failed: Vec<u32>,
    /// Matches the API reported for the query
    pub total_available: Option<u64>,
    /// Records returned by the API, duplicates included
    pub raw_records: usize,
    pub unique_postings: usize,
    pub duplicates_dropped: usize,
    pub malformed_records: usize,
    /// Rows written per table
    pub table_rows: BTreeMap<String, usize>,
    pub uploads: Vec<UploadResult>,
    pub bytes_uploaded: u64,
    pub duration_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IngestStats {
    pub fn new(run_ts: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            ingest_date: run_ts.date_naive().format("%Y-%m-%d").to_string(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn record_upload(&mut self, upload: UploadResult) {
        self.bytes_uploaded += upload.size;
        self.uploads.push(upload);
    }

    /// Mark stats as completed
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    /// Postings processed per second
    pub fn postings_per_second(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.unique_postings as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}
