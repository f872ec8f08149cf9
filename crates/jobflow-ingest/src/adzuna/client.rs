//! HTTP client for the Adzuna job search API

use super::models::SearchPage;
use crate::config::AdzunaConfig;
use crate::error::{IngestError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Longest error body kept in [`IngestError::Api`]
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Everything collected by one paginated fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Raw postings in page order, exactly as returned by the API
    pub records: Vec<Value>,
    pub pages_fetched: u32,
    /// Pages that still failed after retries and were skipped
    pub pages_failed: Vec<u32>,
    /// Total matches reported by the last successful page
    pub total_available: Option<u64>,
}

/// Adzuna API client
pub struct AdzunaClient {
    client: Client,
    config: AdzunaConfig,
}

impl AdzunaClient {
    pub fn new(config: AdzunaConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| IngestError::Config(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("jobflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AdzunaConfig {
        &self.config
    }

    /// URL of a result page (1-based), without credentials
    pub fn page_url(&self, page: u32) -> String {
        format!(
            "{}/jobs/{}/search/{}",
            self.config.base_url, self.config.country, page
        )
    }

    /// Fetch one page, retrying transient failures
    #[instrument(skip(self))]
    pub async fn fetch_page(&self, page: u32) -> Result<SearchPage> {
        self.config
            .retry
            .run("adzuna_fetch_page", move |attempt| {
                debug!(page, attempt, "Requesting Adzuna page");
                self.fetch_page_once(page)
            })
            .await
    }

    async fn fetch_page_once(&self, page: u32) -> Result<SearchPage> {
        let per_page = self.config.per_page.to_string();
        let response = self
            .client
            .get(self.page_url(page))
            .query(&[
                ("app_id", self.config.app_id.as_str()),
                ("app_key", self.config.app_key.as_str()),
                ("results_per_page", per_page.as_str()),
                ("what", self.config.what.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IngestError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Api {
                page,
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(response.json::<SearchPage>().await?)
    }

    /// Walk pages `1..=max_pages` in order
    ///
    /// A page that keeps failing is skipped; credentials errors abort. An
    /// empty page means the result set is exhausted. The call fails only when
    /// no page at all could be fetched.
    pub async fn fetch_jobs(&self) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let mut last_error = None;

        for page in 1..=self.config.max_pages {
            match self.fetch_page(page).await {
                Ok(result) => {
                    outcome.pages_fetched += 1;
                    if result.count.is_some() {
                        outcome.total_available = result.count;
                    }
                    if result.results.is_empty() {
                        info!(page, "Adzuna returned an empty page, stopping pagination");
                        break;
                    }
                    info!(page, records = result.results.len(), "Fetched Adzuna page");
                    outcome.records.extend(result.results);
                },
                Err(err @ IngestError::Unauthorized { .. }) => return Err(err),
                Err(err) => {
                    warn!(page, error = %err, "Failed to fetch page, skipping");
                    outcome.pages_failed.push(page);
                    last_error = Some(err);
                },
            }
        }

        if outcome.pages_fetched == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }

        info!(
            records = outcome.records.len(),
            pages_fetched = outcome.pages_fetched,
            pages_failed = outcome.pages_failed.len(),
            "Adzuna fetch complete"
        );

        Ok(outcome)
    }
}
