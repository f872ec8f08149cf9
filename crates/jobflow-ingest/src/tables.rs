//! Relational split of normalized postings
//!
//! Five tables, each with exactly one row per posting and keyed by `job_id`,
//! so any join on `job_id` is total:
//!
//! | table      | columns |
//! |------------|---------|
//! | jobs       | job_id, title, description, salary_min, salary_max, created, redirect_url, ingest_ts, ingest_date |
//! | companies  | job_id, company_name |
//! | locations  | job_id, city, state, country |
//! | categories | job_id, category_label |
//! | jobstats   | job_id, contract_type, contract_time, posting_week |

use crate::transform::JobPosting;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JOBS: &str = "jobs";
pub const COMPANIES: &str = "companies";
pub const LOCATIONS: &str = "locations";
pub const CATEGORIES: &str = "categories";
pub const JOBSTATS: &str = "jobstats";

/// Table names in upload order
pub const TABLE_NAMES: [&str; 5] = [JOBS, COMPANIES, LOCATIONS, CATEGORIES, JOBSTATS];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub job_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub created: Option<String>,
    pub redirect_url: Option<String>,
    pub ingest_ts: String,
    pub ingest_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRow {
    pub job_id: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRow {
    pub job_id: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub job_id: String,
    pub category_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatRow {
    pub job_id: String,
    pub contract_type: Option<String>,
    pub contract_time: Option<String>,
    pub posting_week: Option<String>,
}

/// The five output tables of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub jobs: Vec<JobRow>,
    pub companies: Vec<CompanyRow>,
    pub locations: Vec<LocationRow>,
    pub categories: Vec<CategoryRow>,
    pub jobstats: Vec<JobStatRow>,
}

/// Split normalized postings into the five tables
pub fn split_tables(postings: &[JobPosting]) -> Tables {
    let mut tables = Tables::default();

    for p in postings {
        tables.jobs.push(JobRow {
            job_id: p.job_id.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            salary_min: p.salary_min,
            salary_max: p.salary_max,
            created: p.created.clone(),
            redirect_url: p.redirect_url.clone(),
            ingest_ts: p.ingest_ts.clone(),
            ingest_date: p.ingest_date.clone(),
        });
        tables.companies.push(CompanyRow {
            job_id: p.job_id.clone(),
            company_name: p.company.clone(),
        });
        tables.locations.push(LocationRow {
            job_id: p.job_id.clone(),
            city: p.city.clone(),
            state: p.state.clone(),
            country: p.country.clone(),
        });
        tables.categories.push(CategoryRow {
            job_id: p.job_id.clone(),
            category_label: p.category.clone(),
        });
        tables.jobstats.push(JobStatRow {
            job_id: p.job_id.clone(),
            contract_type: p.contract_type.clone(),
            contract_time: p.contract_time.clone(),
            posting_week: p.posting_week.clone(),
        });
    }

    tables
}

impl Tables {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Columnar frames in [`TABLE_NAMES`] order
    pub fn frames(&self) -> Vec<TableFrame> {
        vec![
            TableFrame::new(
                JOBS,
                vec![
                    text("job_id", &self.jobs, |r| Some(r.job_id.clone())),
                    text("title", &self.jobs, |r| r.title.clone()),
                    text("description", &self.jobs, |r| r.description.clone()),
                    float("salary_min", &self.jobs, |r| r.salary_min),
                    float("salary_max", &self.jobs, |r| r.salary_max),
                    text("created", &self.jobs, |r| r.created.clone()),
                    text("redirect_url", &self.jobs, |r| r.redirect_url.clone()),
                    text("ingest_ts", &self.jobs, |r| Some(r.ingest_ts.clone())),
                    text("ingest_date", &self.jobs, |r| Some(r.ingest_date.clone())),
                ],
            ),
            TableFrame::new(
                COMPANIES,
                vec![
                    text("job_id", &self.companies, |r| Some(r.job_id.clone())),
                    text("company_name", &self.companies, |r| r.company_name.clone()),
                ],
            ),
            TableFrame::new(
                LOCATIONS,
                vec![
                    text("job_id", &self.locations, |r| Some(r.job_id.clone())),
                    text("city", &self.locations, |r| r.city.clone()),
                    text("state", &self.locations, |r| r.state.clone()),
                    text("country", &self.locations, |r| r.country.clone()),
                ],
            ),
            TableFrame::new(
                CATEGORIES,
                vec![
                    text("job_id", &self.categories, |r| Some(r.job_id.clone())),
                    text("category_label", &self.categories, |r| r.category_label.clone()),
                ],
            ),
            TableFrame::new(
                JOBSTATS,
                vec![
                    text("job_id", &self.jobstats, |r| Some(r.job_id.clone())),
                    text("contract_type", &self.jobstats, |r| r.contract_type.clone()),
                    text("contract_time", &self.jobstats, |r| r.contract_time.clone()),
                    text("posting_week", &self.jobstats, |r| r.posting_week.clone()),
                ],
            ),
        ]
    }
}

/// Values of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell rendered as text; `None` for nulls
    pub fn display(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Text(v) => v.get(row).cloned().flatten(),
            ColumnData::Float(v) => v.get(row).copied().flatten().map(|f| f.to_string()),
        }
    }

    /// Cell as a JSON value
    pub fn json(&self, row: usize) -> Value {
        match self {
            ColumnData::Text(v) => v
                .get(row)
                .cloned()
                .flatten()
                .map(Value::String)
                .unwrap_or(Value::Null),
            ColumnData::Float(v) => v
                .get(row)
                .copied()
                .flatten()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub data: ColumnData,
}

/// A named table in columnar form, ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct TableFrame {
    pub name: &'static str,
    pub columns: Vec<Column>,
}

impl TableFrame {
    pub fn new(name: &'static str, columns: Vec<Column>) -> Self {
        Self { name, columns }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn text<R>(name: &'static str, rows: &[R], f: impl Fn(&R) -> Option<String>) -> Column {
    Column {
        name,
        data: ColumnData::Text(rows.iter().map(f).collect()),
    }
}

fn float<R>(name: &'static str, rows: &[R], f: impl Fn(&R) -> Option<f64>) -> Column {
    Column {
        name,
        data: ColumnData::Float(rows.iter().map(f).collect()),
    }
}
