//! Dashboard metrics over a stored snapshot
//!
//! Every table has one row per `job_id`, so joining them is a lookup. All
//! rankings break ties alphabetically to keep reports stable.

use crate::error::{IngestError, Result};
use crate::storage::{layout, ObjectStore};
use crate::tables::{split_tables, Tables};
use crate::transform::normalize;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Default number of rows in ranked lists
pub const DEFAULT_TOP: usize = 10;

/// Maximum rows returned by searches
pub const SEARCH_LIMIT: usize = 100;

/// One posting with all table columns joined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub company: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub created: Option<String>,
    pub posting_week: Option<String>,
    pub redirect_url: Option<String>,
}

impl JobView {
    /// Midpoint of the salary range when both bounds are known
    pub fn salary_mid(&self) -> Option<f64> {
        Some((self.salary_min? + self.salary_max?) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub total_jobs: usize,
    pub unique_companies: usize,
    pub total_categories: usize,
    /// Mean salary midpoint, rounded to whole units
    pub avg_salary: Option<f64>,
    pub most_common_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInsight {
    pub company: String,
    pub jobs: usize,
    /// Mean salary bounds, rounded to whole units
    pub avg_salary_min: Option<f64>,
    pub avg_salary_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityInsight {
    pub city: String,
    pub jobs: usize,
    pub avg_salary: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCount {
    /// Monday of the week, `YYYY-MM-DD`
    pub week: String,
    pub jobs: usize,
}

/// Joined view of one snapshot
#[derive(Debug, Clone, Default)]
pub struct Insights {
    jobs: Vec<JobView>,
}

impl Insights {
    pub fn new(tables: &Tables) -> Self {
        fn index<'a, R>(rows: &'a [R], id: impl Fn(&R) -> &str) -> HashMap<&'a str, &'a R>
        where
            R: 'a,
        {
            let mut map = HashMap::with_capacity(rows.len());
            for row in rows {
                map.insert(id(row), row);
            }
            map
        }

        let companies = index(&tables.companies, |r| r.job_id.as_str());
        let categories = index(&tables.categories, |r| r.job_id.as_str());
        let locations = index(&tables.locations, |r| r.job_id.as_str());
        let stats = index(&tables.jobstats, |r| r.job_id.as_str());

        let jobs = tables
            .jobs
            .iter()
            .map(|job| {
                let id = job.job_id.as_str();
                let location = locations.get(id);
                JobView {
                    job_id: job.job_id.clone(),
                    title: job.title.clone(),
                    description: job.description.clone(),
                    company: companies.get(id).and_then(|c| c.company_name.clone()),
                    category: categories.get(id).and_then(|c| c.category_label.clone()),
                    city: location.and_then(|l| l.city.clone()),
                    state: location.and_then(|l| l.state.clone()),
                    country: location.and_then(|l| l.country.clone()),
                    salary_min: job.salary_min,
                    salary_max: job.salary_max,
                    created: job.created.clone(),
                    posting_week: stats.get(id).and_then(|s| s.posting_week.clone()),
                    redirect_url: job.redirect_url.clone(),
                }
            })
            .collect();

        Self { jobs }
    }

    /// Normalize and split raw records, then join them
    pub fn from_records(records: &[Value], partition: NaiveDate) -> Self {
        let run_ts = partition.and_time(NaiveTime::MIN).and_utc();
        let normalized = normalize(records, run_ts);
        Self::new(&split_tables(&normalized.postings))
    }

    pub fn jobs(&self) -> &[JobView] {
        &self.jobs
    }

    pub fn overview(&self) -> Overview {
        let companies: BTreeSet<&str> =
            self.jobs.iter().filter_map(|j| j.company.as_deref()).collect();
        let categories: BTreeSet<&str> =
            self.jobs.iter().filter_map(|j| j.category.as_deref()).collect();

        Overview {
            total_jobs: self.jobs.len(),
            unique_companies: companies.len(),
            total_categories: categories.len(),
            avg_salary: rounded_mean(self.jobs.iter().filter_map(JobView::salary_mid)),
            most_common_category: self.top_categories(1).into_iter().next().map(|c| c.category),
        }
    }

    /// Categories by number of postings, largest first
    pub fn top_categories(&self, n: usize) -> Vec<CategoryCount> {
        ranked(self.jobs.iter().filter_map(|j| j.category.as_deref()))
            .into_iter()
            .take(n)
            .map(|(category, jobs)| CategoryCount { category, jobs })
            .collect()
    }

    pub fn jobs_in_category(&self, label: &str, limit: usize) -> Vec<JobView> {
        self.jobs
            .iter()
            .filter(|j| j.category.as_deref() == Some(label))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Companies by number of postings with their rounded average salary bounds
    pub fn top_companies(&self, n: usize) -> Vec<CompanyInsight> {
        ranked(self.jobs.iter().filter_map(|j| j.company.as_deref()))
            .into_iter()
            .take(n)
            .map(|(company, jobs)| {
                let average = |bound: fn(&JobView) -> Option<f64>| {
                    rounded_mean(
                        self.jobs
                            .iter()
                            .filter(|j| j.company.as_deref() == Some(company.as_str()))
                            .filter_map(bound),
                    )
                };
                CompanyInsight {
                    avg_salary_min: average(|j| j.salary_min),
                    avg_salary_max: average(|j| j.salary_max),
                    company,
                    jobs,
                }
            })
            .collect()
    }

    /// A company's postings, newest first
    pub fn jobs_at_company(&self, company: &str, limit: usize) -> Vec<JobView> {
        let mut jobs: Vec<JobView> = self
            .jobs
            .iter()
            .filter(|j| j.company.as_deref() == Some(company))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created.cmp(&a.created));
        jobs.truncate(limit);
        jobs
    }

    /// Cities by number of postings, optionally within one category
    pub fn city_insights(&self, category: Option<&str>, n: usize) -> Vec<CityInsight> {
        let in_scope = |j: &&JobView| category.is_none() || j.category.as_deref() == category;

        ranked(self.jobs.iter().filter(in_scope).filter_map(|j| j.city.as_deref()))
            .into_iter()
            .take(n)
            .map(|(city, jobs)| {
                let avg_salary = rounded_mean(
                    self.jobs
                        .iter()
                        .filter(in_scope)
                        .filter(|j| j.city.as_deref() == Some(city.as_str()))
                        .filter_map(JobView::salary_mid),
                );
                CityInsight {
                    city,
                    jobs,
                    avg_salary,
                }
            })
            .collect()
    }

    /// Postings per posting week, oldest week first
    pub fn weekly_trends(&self) -> Vec<WeeklyCount> {
        let mut weeks: BTreeMap<&str, usize> = BTreeMap::new();
        for week in self.jobs.iter().filter_map(|j| j.posting_week.as_deref()) {
            *weeks.entry(week).or_default() += 1;
        }
        weeks
            .into_iter()
            .map(|(week, jobs)| WeeklyCount {
                week: week.to_string(),
                jobs,
            })
            .collect()
    }

    /// Case-insensitive substring search on titles
    pub fn search_titles(&self, keyword: &str, limit: usize) -> Vec<JobView> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Vec::new();
        }
        self.jobs
            .iter()
            .filter(|j| {
                j.title
                    .as_deref()
                    .is_some_and(|title| title.to_lowercase().contains(&keyword))
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Values counted and sorted by count descending, then value ascending
fn ranked<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn rounded_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    mean(values).map(f64::round)
}

// ============================================================================
// Reports
// ============================================================================

/// A raw snapshot loaded back from storage
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub key: String,
    pub date: NaiveDate,
    pub records: Vec<Value>,
}

/// Load the latest raw snapshot, optionally restricted to one date
pub async fn load_snapshot(store: &dyn ObjectStore, date: Option<NaiveDate>) -> Result<Snapshot> {
    let prefix = match date {
        Some(date) => layout::raw_prefix(date),
        None => format!("{}/", layout::RAW_ROOT),
    };

    let keys = store.list(&prefix).await?;
    debug!(prefix = %prefix, count = keys.len(), "Listed raw snapshots");

    // Keys sort by partition date, then by run time within the day.
    let (key, date) = keys
        .iter()
        .filter(|key| key.ends_with(".json"))
        .filter_map(|key| layout::partition_date(key).map(|date| (key, date)))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .ok_or_else(|| IngestError::NotFound(store.uri(&prefix)))?;

    let bytes = store.get(key).await?;
    let records: Vec<Value> = serde_json::from_slice(&bytes)?;
    info!(uri = %store.uri(key), records = records.len(), "Loaded raw snapshot");

    Ok(Snapshot {
        key: key.clone(),
        date,
        records,
    })
}

/// What to include in a report besides the fixed sections
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub top: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub ingest_date: NaiveDate,
    pub source: String,
    pub overview: Overview,
    pub top_categories: Vec<CategoryCount>,
    pub top_companies: Vec<CompanyInsight>,
    pub city_insights: Vec<CityInsight>,
    pub weekly_trends: Vec<WeeklyCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_jobs: Option<Vec<JobView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<JobView>>,
}

impl Report {
    pub fn build(snapshot: &Snapshot, options: &ReportOptions) -> Self {
        let insights = Insights::from_records(&snapshot.records, snapshot.date);
        let top = if options.top == 0 { DEFAULT_TOP } else { options.top };
        let category = options.category.as_deref();

        Self {
            ingest_date: snapshot.date,
            source: snapshot.key.clone(),
            overview: insights.overview(),
            top_categories: insights.top_categories(top),
            top_companies: insights.top_companies(top),
            city_insights: insights.city_insights(category, top),
            weekly_trends: insights.weekly_trends(),
            category_jobs: category.map(|label| insights.jobs_in_category(label, SEARCH_LIMIT)),
            search_results: options
                .keyword
                .as_deref()
                .map(|keyword| insights.search_titles(keyword, SEARCH_LIMIT)),
        }
    }
}
