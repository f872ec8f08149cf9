//! Ingestion configuration
//!
//! Everything is read from environment variables (a `.env` file is loaded
//! first when present). Parsing and validation are separate: `list` and
//! `report` only need storage settings, so each command validates the
//! sections it uses.

use crate::encode::TableFormat;
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Context};
use chrono::NaiveTime;
use jobflow_common::{JobflowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_ADZUNA_BASE_URL: &str = "https://api.adzuna.com/v1/api";
pub const DEFAULT_ADZUNA_COUNTRY: &str = "us";
pub const DEFAULT_SEARCH_TERMS: &str = "data science";
pub const DEFAULT_MAX_PAGES: u32 = 3;
pub const DEFAULT_PER_PAGE: u32 = 50;
/// Adzuna caps `results_per_page` at 50.
pub const MAX_PER_PAGE: u32 = 50;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_GCS_REGION: &str = "auto";
pub const DEFAULT_LOCAL_OUTPUT_DIR: &str = "./data";

pub const DEFAULT_SCHEDULE_RETRIES: u32 = 1;
pub const DEFAULT_SCHEDULE_RETRY_DELAY_SECS: u64 = 300;

/// Adzuna search API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdzunaConfig {
    pub base_url: String,
    pub country: String,
    pub app_id: String,
    pub app_key: String,
    /// Free-text search terms (`what` query parameter)
    pub what: String,
    pub max_pages: u32,
    pub per_page: u32,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for AdzunaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ADZUNA_BASE_URL.to_string(),
            country: DEFAULT_ADZUNA_COUNTRY.to_string(),
            app_id: String::new(),
            app_key: String::new(),
            what: DEFAULT_SEARCH_TERMS.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            per_page: DEFAULT_PER_PAGE,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

impl AdzunaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() || self.app_key.trim().is_empty() {
            return Err(JobflowError::config(
                "ADZUNA_APP_ID and ADZUNA_APP_KEY must be set",
            ));
        }
        if self.base_url.is_empty() {
            return Err(JobflowError::config("ADZUNA_BASE_URL cannot be empty"));
        }
        if self.country.is_empty() {
            return Err(JobflowError::config("ADZUNA_COUNTRY cannot be empty"));
        }
        if self.max_pages == 0 {
            return Err(JobflowError::config("INGEST_MAX_PAGES must be greater than 0"));
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(JobflowError::config(format!(
                "INGEST_PER_PAGE must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.per_page
            )));
        }
        if self.timeout_secs == 0 {
            return Err(JobflowError::config("ADZUNA_TIMEOUT_SECS must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(JobflowError::config("INGEST_MAX_RETRIES must be at least 1"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where objects are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gcs,
    Local,
}

impl std::str::FromStr for StorageBackend {
    type Err = JobflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gcs" | "gs" => Ok(StorageBackend::Gcs),
            "local" | "fs" => Ok(StorageBackend::Local),
            _ => Err(JobflowError::config(format!(
                "Invalid STORAGE_BACKEND: {}. Must be 'gcs' or 'local'",
                s
            ))),
        }
    }
}

/// Object storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub local_dir: PathBuf,
    /// GCP project, only used for log context
    pub project: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Gcs,
            bucket: String::new(),
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            region: DEFAULT_GCS_REGION.to_string(),
            access_key: None,
            secret_key: None,
            local_dir: PathBuf::from(DEFAULT_LOCAL_OUTPUT_DIR),
            project: None,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            StorageBackend::Gcs => {
                if self.bucket.trim().is_empty() {
                    return Err(JobflowError::config(
                        "Missing BUCKET_NAME in environment, cannot upload to GCS",
                    ));
                }
                if self.access_key.is_none() || self.secret_key.is_none() {
                    return Err(JobflowError::config(
                        "GCS_HMAC_ACCESS_KEY and GCS_HMAC_SECRET must be set for the gcs backend",
                    ));
                }
                if self.endpoint.is_empty() {
                    return Err(JobflowError::config("GCS_ENDPOINT cannot be empty"));
                }
            },
            StorageBackend::Local => {
                if self.local_dir.as_os_str().is_empty() {
                    return Err(JobflowError::config("LOCAL_OUTPUT_DIR cannot be empty"));
                }
            },
        }
        Ok(())
    }
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: TableFormat,
    /// Skip a run when today's partition already holds a jobs table
    pub skip_existing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: TableFormat::Parquet,
            skip_existing: true,
        }
    }
}

/// Daily scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Time of day (UTC) at which the daily run starts
    pub time_of_day: NaiveTime,
    /// Extra attempts after a failed run
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_of_day: NaiveTime::MIN,
            retries: DEFAULT_SCHEDULE_RETRIES,
            retry_delay_secs: DEFAULT_SCHEDULE_RETRY_DELAY_SECS,
        }
    }
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Parse `HH:MM` into a UTC time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        JobflowError::config(format!("SCHEDULE_TIME must be HH:MM, got '{}'", value))
    })
}

/// Complete ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub adzuna: AdzunaConfig,
    pub storage: StorageConfig,
    pub output: OutputConfig,
    pub schedule: ScheduleConfig,
}

impl IngestConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::default();

        let adzuna = &mut config.adzuna;
        if let Some(v) = get("ADZUNA_BASE_URL") {
            adzuna.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ADZUNA_COUNTRY") {
            adzuna.country = v.to_lowercase();
        }
        adzuna.app_id = get("ADZUNA_APP_ID").unwrap_or_default();
        adzuna.app_key = get("ADZUNA_APP_KEY").unwrap_or_default();
        if let Some(v) = get("ADZUNA_WHAT") {
            adzuna.what = v;
        }
        adzuna.max_pages = parse_or(&get, "INGEST_MAX_PAGES", DEFAULT_MAX_PAGES)?;
        adzuna.per_page = parse_or(&get, "INGEST_PER_PAGE", DEFAULT_PER_PAGE)?;
        adzuna.timeout_secs = parse_or(&get, "ADZUNA_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        adzuna.retry.max_attempts =
            parse_or(&get, "INGEST_MAX_RETRIES", crate::retry::DEFAULT_MAX_ATTEMPTS)?;
        if let Some(ms) = get("INGEST_RETRY_MIN_BACKOFF_MS") {
            adzuna.retry.min_backoff = Duration::from_millis(
                ms.parse().context("INGEST_RETRY_MIN_BACKOFF_MS must be an integer")?,
            );
        }
        if let Some(ms) = get("INGEST_RETRY_MAX_BACKOFF_MS") {
            adzuna.retry.max_backoff = Duration::from_millis(
                ms.parse().context("INGEST_RETRY_MAX_BACKOFF_MS must be an integer")?,
            );
        }

        let storage = &mut config.storage;
        if let Some(v) = get("STORAGE_BACKEND") {
            storage.backend = v.parse()?;
        }
        storage.bucket = get("BUCKET_NAME").or_else(|| get("GCS_BUCKET")).unwrap_or_default();
        if let Some(v) = get("GCS_ENDPOINT") {
            storage.endpoint = v;
        }
        if let Some(v) = get("GCS_REGION") {
            storage.region = v;
        }
        storage.access_key = get("GCS_HMAC_ACCESS_KEY");
        storage.secret_key = get("GCS_HMAC_SECRET");
        if let Some(v) = get("LOCAL_OUTPUT_DIR") {
            storage.local_dir = PathBuf::from(v);
        }
        storage.project = get("GCP_PROJECT");

        if let Some(v) = get("INGEST_OUTPUT_FORMAT") {
            config.output.format = v.parse()?;
        }
        config.output.skip_existing = parse_or(&get, "INGEST_SKIP_EXISTING", true)?;

        if let Some(v) = get("SCHEDULE_TIME") {
            config.schedule.time_of_day = parse_time_of_day(&v)?;
        }
        config.schedule.retries = parse_or(&get, "SCHEDULE_RETRIES", DEFAULT_SCHEDULE_RETRIES)?;
        config.schedule.retry_delay_secs = parse_or(
            &get,
            "SCHEDULE_RETRY_DELAY_SECS",
            DEFAULT_SCHEDULE_RETRY_DELAY_SECS,
        )?;

        Ok(config)
    }

    /// Validate everything a pipeline run needs
    pub fn validate_for_run(&self) -> Result<()> {
        self.adzuna.validate()?;
        self.storage.validate()
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}
