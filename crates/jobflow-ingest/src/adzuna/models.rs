//! Adzuna search API payloads
//!
//! The API is loosely typed: ids arrive as strings or numbers, salaries as
//! numbers, numeric strings or not at all. Deserialization here never fails
//! on those fields; unusable values become `None`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One page of `/jobs/{country}/search/{page}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<Value>,
    /// Total number of matches reported by the API
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Administrative hierarchy, country first: `["US", "California", "San Mateo County", "Redwood City"]`
    #[serde(default, deserialize_with = "lenient_strings")]
    pub area: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A single job posting as returned by Adzuna
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawJob {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub salary_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub contract_time: Option<String>,
    /// Fields this model does not name, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawJob {
    /// Interpret a raw JSON value as a posting
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        RawJob::deserialize(value)
    }

    pub fn company_name(&self) -> Option<&str> {
        self.company.as_ref()?.display_name.as_deref()
    }

    pub fn location_name(&self) -> Option<&str> {
        self.location.as_ref()?.display_name.as_deref()
    }

    pub fn area(&self) -> &[String] {
        self.location.as_ref().map(|l| l.area.as_slice()).unwrap_or(&[])
    }

    pub fn category_label(&self) -> Option<&str> {
        self.category.as_ref()?.label.as_deref()
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
