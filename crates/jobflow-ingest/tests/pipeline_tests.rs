//! End-to-end pipeline tests with a mock Adzuna API
//!
//! Uploads go to an in-memory store or a temporary directory.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jobflow_ingest::config::{AdzunaConfig, OutputConfig};
use jobflow_ingest::storage::{LocalStore, MemoryStore};
use jobflow_ingest::{
    AdzunaClient, IngestError, ObjectStore, Pipeline, RetryPolicy, TableFormat, UploadResult,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn job(id: &str, title: &str, company: &str, category: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "Build models and pipelines.",
        "company": {"display_name": company},
        "location": {"display_name": "Boston, Suffolk County", "area": ["US", "Massachusetts", "Suffolk County", "Boston"]},
        "salary_min": 100000,
        "salary_max": 140000,
        "created": "2025-10-10T12:00:00Z",
        "redirect_url": format!("https://www.adzuna.com/details/{}", id),
        "category": {"label": category, "tag": "it-jobs"},
        "contract_type": "permanent",
        "contract_time": "full_time"
    })
}

fn run_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 14, 0, 0, 5).unwrap()
}

async fn mock_api(results: Vec<Value>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/us/search/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": results.len(), "results": results})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/us/search/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0, "results": []})))
        .mount(&server)
        .await;
    server
}

fn client(server: &MockServer) -> AdzunaClient {
    AdzunaClient::new(AdzunaConfig {
        base_url: server.uri(),
        app_id: "id".into(),
        app_key: "key".into(),
        max_pages: 3,
        retry: RetryPolicy {
            max_attempts: 2,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
        ..Default::default()
    })
    .unwrap()
}

fn output(format: TableFormat, skip_existing: bool) -> OutputConfig {
    OutputConfig {
        format,
        skip_existing,
    }
}

const TABLE_KEYS: [&str; 5] = [
    "processed/categories/ingest_date=2025-10-14/categories_2025-10-14.parquet",
    "processed/companies/ingest_date=2025-10-14/companies_2025-10-14.parquet",
    "processed/jobs/ingest_date=2025-10-14/jobs_2025-10-14.parquet",
    "processed/jobstats/ingest_date=2025-10-14/jobstats_2025-10-14.parquet",
    "processed/locations/ingest_date=2025-10-14/locations_2025-10-14.parquet",
];

const RAW_KEY: &str = "raw/adzuna/ingest_date=2025-10-14/adzuna_jobs_000005.json";

/// Memory store whose uploads under one prefix fail until it is repaired
struct BrokenPrefixStore {
    inner: MemoryStore,
    prefix: &'static str,
    broken: AtomicBool,
}

impl BrokenPrefixStore {
    fn new(prefix: &'static str) -> Self {
        Self {
            inner: MemoryStore::new("jobs-bucket"),
            prefix,
            broken: AtomicBool::new(true),
        }
    }

    fn repair(&self) {
        self.broken.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for BrokenPrefixStore {
    fn uri(&self, key: &str) -> String {
        self.inner.uri(key)
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> jobflow_ingest::Result<UploadResult> {
        if self.broken.load(Ordering::SeqCst) && key.starts_with(self.prefix) {
            return Err(IngestError::Storage("503 Service Unavailable".into()));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> jobflow_ingest::Result<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> jobflow_ingest::Result<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> jobflow_ingest::Result<Vec<String>> {
        self.inner.list(prefix).await
    }
}

#[tokio::test]
async fn test_run_writes_raw_and_tables() {
    let server = mock_api(vec![
        job("1", "Data Scientist", "ACME", "IT Jobs"),
        job("2", "Data Engineer", "ACME", "IT Jobs"),
        job("1", "Data Scientist", "ACME", "IT Jobs"),
    ])
    .await;
    let store = Arc::new(MemoryStore::new("jobs-bucket"));
    let pipeline = Pipeline::new(client(&server), store.clone(), output(TableFormat::Parquet, true));

    let stats = pipeline.run(run_ts()).await.unwrap();

    assert!(!stats.skipped);
    assert_eq!(stats.ingest_date, "2025-10-14");
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.raw_records, 3);
    assert_eq!(stats.unique_postings, 2);
    assert_eq!(stats.duplicates_dropped, 1);
    assert_eq!(stats.uploads.len(), 6);
    for rows in stats.table_rows.values() {
        assert_eq!(*rows, 2);
    }

    let mut expected: Vec<&str> = TABLE_KEYS.to_vec();
    expected.insert(0, RAW_KEY);
    expected.sort();
    assert_eq!(store.list("").await.unwrap(), expected);

    // The raw snapshot keeps every record, duplicates included
    let raw: Vec<Value> = serde_json::from_slice(&store.get(RAW_KEY).await.unwrap()).unwrap();
    assert_eq!(raw.len(), 3);

    let jobs = store.object(TABLE_KEYS[2]).await.unwrap();
    assert_eq!(jobs.content_type, "application/vnd.apache.parquet");
    assert_eq!(&jobs.data[..4], b"PAR1");

    let upload = stats.uploads.iter().find(|u| u.key == TABLE_KEYS[2]).unwrap();
    assert_eq!(upload.uri, format!("mem://jobs-bucket/{}", TABLE_KEYS[2]));
    assert_eq!(upload.checksum.len(), 64);
}

#[tokio::test]
async fn test_existing_partition_is_skipped() {
    let server = mock_api(vec![job("1", "Data Scientist", "ACME", "IT Jobs")]).await;
    let store = Arc::new(MemoryStore::new("jobs-bucket"));
    let pipeline = Pipeline::new(client(&server), store.clone(), output(TableFormat::Parquet, true));

    pipeline.run(run_ts()).await.unwrap();
    let objects = store.len().await;
    let requests = server.received_requests().await.unwrap().len();

    let second = pipeline.run(run_ts() + chrono::Duration::hours(1)).await.unwrap();

    assert!(second.skipped);
    assert!(second.uploads.is_empty());
    assert_eq!(store.len().await, objects);
    assert_eq!(server.received_requests().await.unwrap().len(), requests);
}

#[tokio::test]
async fn test_rerun_without_skip_overwrites_tables() {
    let server = mock_api(vec![job("1", "Data Scientist", "ACME", "IT Jobs")]).await;
    let store = Arc::new(MemoryStore::new("jobs-bucket"));
    let pipeline = Pipeline::new(client(&server), store.clone(), output(TableFormat::Parquet, false));

    pipeline.run(run_ts()).await.unwrap();
    let second = pipeline.run(run_ts() + chrono::Duration::hours(1)).await.unwrap();

    assert!(!second.skipped);
    // Two raw snapshots, one set of tables
    assert_eq!(store.list("raw/").await.unwrap().len(), 2);
    assert_eq!(store.list("processed/").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_failed_table_upload_is_redone_on_retry() {
    let server = mock_api(vec![
        job("1", "Data Scientist", "ACME", "IT Jobs"),
        job("2", "Data Engineer", "Globex", "IT Jobs"),
    ])
    .await;
    let store = Arc::new(BrokenPrefixStore::new("processed/companies/"));
    let pipeline = Pipeline::new(client(&server), store.clone(), output(TableFormat::Parquet, true));

    let first = pipeline.run(run_ts()).await;
    assert!(matches!(first, Err(IngestError::Storage(_))));
    // The jobs table marks a complete partition and must not exist yet
    assert!(!store.exists(TABLE_KEYS[2]).await.unwrap());

    store.repair();
    let second = pipeline.run(run_ts() + chrono::Duration::minutes(5)).await.unwrap();

    assert!(!second.skipped);
    assert_eq!(second.table_rows.len(), 5);
    assert_eq!(store.list("processed/").await.unwrap(), TABLE_KEYS.to_vec());
    assert_eq!(second.uploads.last().unwrap().key, TABLE_KEYS[2]);
}

#[tokio::test]
async fn test_partition_in_other_format_is_skipped() {
    let server = mock_api(vec![job("1", "Data Scientist", "ACME", "IT Jobs")]).await;
    let store = Arc::new(MemoryStore::new("jobs-bucket"));

    Pipeline::new(client(&server), store.clone(), output(TableFormat::Csv, true))
        .run(run_ts())
        .await
        .unwrap();

    let parquet = Pipeline::new(client(&server), store.clone(), output(TableFormat::Parquet, true));
    let stats = parquet.run(run_ts() + chrono::Duration::hours(2)).await.unwrap();

    assert!(stats.skipped);
    assert!(store.list("processed/").await.unwrap().iter().all(|k| k.ends_with(".csv")));
}

#[tokio::test]
async fn test_no_postings_writes_only_raw_snapshot() {
    let server = mock_api(vec![]).await;
    let store = Arc::new(MemoryStore::new("jobs-bucket"));
    let pipeline = Pipeline::new(client(&server), store.clone(), output(TableFormat::Parquet, true));

    let stats = pipeline.run(run_ts()).await.unwrap();

    assert_eq!(stats.raw_records, 0);
    assert!(stats.table_rows.is_empty());
    assert_eq!(store.list("").await.unwrap(), vec![RAW_KEY.to_string()]);
    assert_eq!(store.get(RAW_KEY).await.unwrap(), b"[]");
}

#[tokio::test]
async fn test_csv_tables_on_local_disk() {
    let server = mock_api(vec![
        job("1", "Data Scientist", "ACME", "IT Jobs"),
        job("2", "Accountant", "Globex", "Accounting Jobs"),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(dir.path()).await.unwrap());
    let pipeline = Pipeline::new(client(&server), store, output(TableFormat::Csv, true));

    pipeline.run(run_ts()).await.unwrap();

    let locations = std::fs::read_to_string(
        dir.path()
            .join("processed/locations/ingest_date=2025-10-14/locations_2025-10-14.csv"),
    )
    .unwrap();
    let lines: Vec<&str> = locations.lines().collect();
    assert_eq!(lines[0], "job_id,city,state,country");
    assert_eq!(lines[1], "1,Boston,Massachusetts,US");
    assert_eq!(lines.len(), 3);

    let categories = std::fs::read_to_string(
        dir.path()
            .join("processed/categories/ingest_date=2025-10-14/categories_2025-10-14.csv"),
    )
    .unwrap();
    assert!(categories.contains("2,Accounting Jobs"));
}
