//! Object key layout
//!
//! ```text
//! raw/adzuna/ingest_date=2025-10-14/adzuna_jobs_031500.json
//! processed/jobs/ingest_date=2025-10-14/jobs_2025-10-14.parquet
//! ```
//!
//! The `ingest_date=` segments are Hive-style partitions so external tables
//! can prune by date.

use crate::encode::TableFormat;
use chrono::{DateTime, NaiveDate, Utc};

pub const RAW_ROOT: &str = "raw/adzuna";
pub const PROCESSED_ROOT: &str = "processed";
const PARTITION: &str = "ingest_date=";

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Prefix holding every raw snapshot of `date`
pub fn raw_prefix(date: NaiveDate) -> String {
    format!("{}/{}{}/", RAW_ROOT, PARTITION, date_str(date))
}

/// Key of the raw snapshot of a run started at `run_ts`
pub fn raw_key(run_ts: DateTime<Utc>) -> String {
    format!(
        "{}adzuna_jobs_{}.json",
        raw_prefix(run_ts.date_naive()),
        run_ts.format("%H%M%S")
    )
}

/// Key of a processed table for `date`
pub fn table_key(table: &str, date: NaiveDate, format: TableFormat) -> String {
    let date = date_str(date);
    format!(
        "{}/{}/{}{}/{}_{}.{}",
        PROCESSED_ROOT,
        table,
        PARTITION,
        date,
        table,
        date,
        format.extension()
    )
}

/// Partition date encoded in a key, if any
pub fn partition_date(key: &str) -> Option<NaiveDate> {
    key.split('/')
        .find_map(|segment| segment.strip_prefix(PARTITION))
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
}
