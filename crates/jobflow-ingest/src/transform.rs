//! Normalization of raw Adzuna postings into flat records

use crate::adzuna::RawJob;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use jobflow_common::checksum::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Country used when a posting carries no location hierarchy
pub const DEFAULT_COUNTRY: &str = "US";

/// One normalized job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub created: Option<String>,
    pub redirect_url: Option<String>,
    pub category: Option<String>,
    pub contract_type: Option<String>,
    pub contract_time: Option<String>,
    /// Monday of the week the posting was created, `YYYY-MM-DD`
    pub posting_week: Option<String>,
    /// Run timestamp, RFC 3339
    pub ingest_ts: String,
    /// Run date, `YYYY-MM-DD`
    pub ingest_date: String,
}

/// Result of normalizing one fetch
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub postings: Vec<JobPosting>,
    /// Records dropped because their job_id was already seen
    pub duplicates: usize,
    /// Records that were not JSON objects of the expected shape
    pub malformed: usize,
}

/// The posting's own id, or a SHA-256 over title, company, location and
/// creation time when the API omitted it.
pub fn stable_job_id(job: &RawJob) -> String {
    if let Some(id) = &job.id {
        return id.clone();
    }

    let raw = [
        job.title.as_deref().unwrap_or_default(),
        job.company_name().unwrap_or_default(),
        job.location_name().unwrap_or_default(),
        job.created.as_deref().unwrap_or_default(),
    ]
    .concat();

    sha256_hex(raw)
}

/// Split the location hierarchy into `(city, state, country)`
///
/// `area` runs country, state, then progressively smaller units; the last
/// entry of a three-or-more element area is taken as the city.
pub fn split_location(job: &RawJob) -> (Option<String>, Option<String>, Option<String>) {
    let area = job.area();
    let country = area
        .first()
        .cloned()
        .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());
    let state = area.get(1).cloned();

    let city = if area.len() >= 3 {
        area.last().cloned()
    } else {
        job.location_name()
            .filter(|name| Some(*name) != state.as_deref() && *name != country)
            .map(str::to_string)
    };

    (city, state, Some(country))
}

/// Parse the API's creation timestamp into a calendar date
pub fn created_date(created: &str) -> Option<NaiveDate> {
    let created = created.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(created) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(created, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts.date());
    }
    NaiveDate::parse_from_str(created, "%Y-%m-%d").ok()
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Normalize raw records fetched in a run started at `run_ts`
///
/// Every record shares the run's timestamp. Duplicate job ids keep their
/// first occurrence.
pub fn normalize(records: &[Value], run_ts: DateTime<Utc>) -> Normalized {
    let ingest_ts = run_ts.to_rfc3339_opts(SecondsFormat::Secs, true);
    let ingest_date = run_ts.date_naive().format("%Y-%m-%d").to_string();

    let mut seen = HashSet::with_capacity(records.len());
    let mut out = Normalized::default();

    for (index, value) in records.iter().enumerate() {
        let job = match RawJob::from_value(value) {
            Ok(job) => job,
            Err(err) => {
                warn!(index, error = %err, "Skipping malformed posting");
                out.malformed += 1;
                continue;
            },
        };

        let job_id = stable_job_id(&job);
        if !seen.insert(job_id.clone()) {
            debug!(%job_id, "Dropping duplicate posting");
            out.duplicates += 1;
            continue;
        }

        let (city, state, country) = split_location(&job);
        let posting_week = job
            .created
            .as_deref()
            .and_then(created_date)
            .map(|d| week_start(d).format("%Y-%m-%d").to_string());

        out.postings.push(JobPosting {
            job_id,
            company: job.company_name().map(str::to_string),
            category: job.category_label().map(str::to_string),
            title: job.title,
            description: job.description,
            city,
            state,
            country,
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            created: job.created,
            redirect_url: job.redirect_url,
            contract_type: job.contract_type,
            contract_time: job.contract_time,
            posting_week,
            ingest_ts: ingest_ts.clone(),
            ingest_date: ingest_date.clone(),
        });
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    pub(crate) fn sample_record(id: &str, title: &str, company: &str, city: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "description": "Data Scientist role focused on machine learning and data analytics.",
            "company": {"display_name": company},
            "location": {"display_name": city, "area": ["US", "California", city]},
            "salary_min": 90000,
            "salary_max": 130000,
            "created": "2025-10-10T12:00:00Z",
            "redirect_url": "https://adzuna.com/job/12345",
            "category": {"label": "Data Science"},
            "contract_type": "permanent",
            "contract_time": "full_time"
        })
    }

    fn run_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 14, 3, 15, 0).unwrap()
    }

    #[test]
    fn test_existing_id_is_kept() {
        let job = RawJob::from_value(&sample_record("JOB123", "DS", "ACME", "Austin")).unwrap();
        assert_eq!(stable_job_id(&job), "JOB123");
    }

    #[test]
    fn test_missing_id_is_hashed_from_fields() {
        let mut value = sample_record("", "Data Scientist", "ACME Analytics", "New York");
        value["id"] = Value::Null;
        let job = RawJob::from_value(&value).unwrap();

        let expected = sha256_hex("Data ScientistACME AnalyticsNew York2025-10-10T12:00:00Z");
        assert_eq!(stable_job_id(&job), expected);
    }

    #[test]
    fn test_location_area_parsing() {
        let job = RawJob::from_value(&sample_record("1", "DS", "ACME", "Pleasant Hill")).unwrap();
        let (city, state, country) = split_location(&job);
        assert_eq!(city.as_deref(), Some("Pleasant Hill"));
        assert_eq!(state.as_deref(), Some("California"));
        assert_eq!(country.as_deref(), Some("US"));
    }

    #[test]
    fn test_location_without_area() {
        let job = RawJob::from_value(&json!({"location": {"display_name": "Remote"}})).unwrap();
        let (city, state, country) = split_location(&job);
        assert_eq!(city.as_deref(), Some("Remote"));
        assert_eq!(state, None);
        assert_eq!(country.as_deref(), Some("US"));
    }

    #[test]
    fn test_state_level_location_has_no_city() {
        let job = RawJob::from_value(&json!({
            "location": {"display_name": "California", "area": ["US", "California"]}
        }))
        .unwrap();
        let (city, state, _) = split_location(&job);
        assert_eq!(city, None);
        assert_eq!(state.as_deref(), Some("California"));
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2025-10-10 is a Friday
        let date = created_date("2025-10-10T12:00:00Z").unwrap();
        assert_eq!(week_start(date), NaiveDate::from_ymd_opt(2025, 10, 6).unwrap());
        // Mondays map to themselves
        let monday = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    #[test]
    fn test_created_date_formats() {
        assert!(created_date("2025-10-10T12:00:00").is_some());
        assert!(created_date("2025-10-10").is_some());
        assert!(created_date("last tuesday").is_none());
    }

    #[test]
    fn test_normalize_shares_run_timestamp() {
        let records = vec![
            sample_record("1", "DS", "ACME", "Austin"),
            sample_record("2", "ML Engineer", "Globex", "Denver"),
        ];
        let out = normalize(&records, run_ts());

        assert_eq!(out.postings.len(), 2);
        for posting in &out.postings {
            assert_eq!(posting.ingest_ts, "2025-10-14T03:15:00Z");
            assert_eq!(posting.ingest_date, "2025-10-14");
            assert_eq!(posting.posting_week.as_deref(), Some("2025-10-06"));
        }
        assert_eq!(out.postings[1].company.as_deref(), Some("Globex"));
        assert_eq!(out.postings[0].category.as_deref(), Some("Data Science"));
    }

    #[test]
    fn test_normalize_drops_duplicates_and_malformed() {
        let records = vec![
            sample_record("1", "DS", "ACME", "Austin"),
            json!(42),
            sample_record("1", "DS (repost)", "ACME", "Austin"),
        ];
        let out = normalize(&records, run_ts());

        assert_eq!(out.postings.len(), 1);
        assert_eq!(out.postings[0].title.as_deref(), Some("DS"));
        assert_eq!(out.duplicates, 1);
        assert_eq!(out.malformed, 1);
    }

    #[test]
    fn test_missing_text_fields_stay_null() {
        let out = normalize(&[json!({"id": "9"})], run_ts());
        let posting = &out.postings[0];
        assert_eq!(posting.title, None);
        assert_eq!(posting.company, None);
        assert_eq!(posting.salary_min, None);
        assert_eq!(posting.posting_week, None);
    }
}
