//! Adzuna job search source
//!
//! Fetches `GET {base}/jobs/{country}/search/{page}` page by page. Records
//! are kept as raw JSON for the snapshot and interpreted through
//! [`RawJob`] only during transformation.

pub mod client;
pub mod models;

pub use client::{AdzunaClient, FetchOutcome};
pub use models::{Category, Company, Location, RawJob, SearchPage};
