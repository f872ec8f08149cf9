//! Daily run loop
//!
//! Runs the pipeline once a day at a fixed UTC time. A failed run is retried
//! `retries` times after `retry_delay`. Slots missed while the process was
//! down are not back-filled, and a new run never starts while the previous
//! one is still going.

use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::stats::IngestStats;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Work executed at every scheduled slot
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn execute(&self, run_ts: DateTime<Utc>) -> Result<IngestStats>;
}

#[async_trait]
impl ScheduledJob for Pipeline {
    async fn execute(&self, run_ts: DateTime<Utc>) -> Result<IngestStats> {
        self.run(run_ts).await
    }
}

/// Next occurrence of `time_of_day` (UTC) strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, time_of_day: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(time_of_day).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Counts of what the loop did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub runs_succeeded: u32,
    pub runs_failed: u32,
}

pub struct Scheduler<J> {
    job: J,
    config: ScheduleConfig,
}

impl<J: ScheduledJob> Scheduler<J> {
    pub fn new(job: J, config: ScheduleConfig) -> Self {
        Self { job, config }
    }

    /// Run one slot: the first attempt plus up to `retries` more
    pub async fn run_with_retries(&self) -> Result<IngestStats> {
        let attempts = self.config.retries + 1;
        let mut attempt = 1;
        loop {
            match self.job.execute(Utc::now()).await {
                Ok(stats) => return Ok(stats),
                Err(err) if attempt < attempts => {
                    warn!(
                        attempt,
                        attempts,
                        retry_in_secs = self.config.retry_delay_secs,
                        error = %err,
                        "Scheduled run failed, will retry"
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Loop over daily slots until `shutdown` resolves
    ///
    /// A run still in progress when `shutdown` resolves is abandoned.
    pub async fn run_until<S>(&self, shutdown: S) -> SchedulerReport
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut report = SchedulerReport::default();
        let mut last_slot: Option<DateTime<Utc>> = None;

        info!(
            time_of_day = %self.config.time_of_day.format("%H:%M"),
            retries = self.config.retries,
            "Scheduler started"
        );

        loop {
            let now = Utc::now();
            // Never schedule the same slot twice, even if the clock lags.
            let reference = last_slot.map_or(now, |slot| slot.max(now));
            let slot = next_run_after(reference, self.config.time_of_day);
            let wait = (slot - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %slot, wait_secs = wait.as_secs(), "Waiting for next run");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
            last_slot = Some(slot);

            tokio::select! {
                _ = &mut shutdown => {
                    warn!(slot = %slot, "Shutdown requested during a run, abandoning it");
                    break;
                }
                result = self.run_with_retries() => match result {
                    Ok(stats) => {
                        report.runs_succeeded += 1;
                        info!(
                            slot = %slot,
                            skipped = stats.skipped,
                            postings = stats.unique_postings,
                            "Scheduled run succeeded"
                        );
                    },
                    Err(err) => {
                        report.runs_failed += 1;
                        error!(slot = %slot, error = %err, "Scheduled run failed after retries");
                    },
                },
            }
        }

        report
    }
}
