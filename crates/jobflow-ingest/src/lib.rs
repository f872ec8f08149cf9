//! Jobflow Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch ETL for Adzuna job postings: fetch the search API page by page,
//! keep the raw JSON snapshot, normalize the postings and write five
//! date-partitioned tables to object storage.
//!
//! # Tables
//!
//! - **jobs**: title, description, salary range, timestamps
//! - **companies**, **locations**, **categories**: one row per posting
//! - **jobstats**: contract type and time, posting week
//!
//! # Example
//!
//! ```no_run
//! use jobflow_ingest::{build_store, AdzunaClient, IngestConfig, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let client = AdzunaClient::new(config.adzuna.clone())?;
//!     let store = build_store(&config.storage).await?;
//!
//!     let stats = Pipeline::new(client, store, config.output.clone())
//!         .run(chrono::Utc::now())
//!         .await?;
//!     println!("{} postings", stats.unique_postings);
//!     Ok(())
//! }
//! ```

pub mod adzuna;
pub mod config;
pub mod encode;
pub mod error;
pub mod insights;
pub mod pipeline;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod tables;
pub mod transform;

pub use adzuna::{AdzunaClient, FetchOutcome};
pub use config::IngestConfig;
pub use encode::TableFormat;
pub use error::{IngestError, Result};
pub use pipeline::Pipeline;
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, ScheduledJob};
pub use stats::IngestStats;
pub use storage::{build_store, ObjectStore, UploadResult};
