//! Jobflow - Adzuna job postings ingestion

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use jobflow_common::logging::{init_logging, LogConfig, LogLevel};
use jobflow_ingest::config::StorageBackend;
use jobflow_ingest::insights::{load_snapshot, Report, ReportOptions, DEFAULT_TOP};
use jobflow_ingest::{build_store, AdzunaClient, IngestConfig, Pipeline, Scheduler, TableFormat};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "jobflow")]
#[command(author, version, about = "Adzuna job postings ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a local directory instead of the GCS bucket
    #[arg(long, global = true, value_name = "DIR")]
    local_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, transform and upload once
    Run {
        /// Number of result pages to fetch
        #[arg(long)]
        pages: Option<u32>,

        /// Results per page (at most 50)
        #[arg(long)]
        per_page: Option<u32>,

        /// Search terms
        #[arg(long)]
        what: Option<String>,

        /// Table format: parquet, csv or jsonl
        #[arg(long)]
        format: Option<TableFormat>,

        /// Run even if today's partition already exists
        #[arg(long)]
        force: bool,
    },

    /// Run daily at SCHEDULE_TIME (UTC) until interrupted
    Schedule,

    /// List stored objects
    List {
        /// Key prefix, e.g. `processed/jobs/`
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Print dashboard metrics for a stored snapshot as JSON
    Report {
        /// Partition date (YYYY-MM-DD); defaults to the latest
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Restrict city insights to a category and list its jobs
        #[arg(long)]
        category: Option<String>,

        /// Search job titles for a keyword
        #[arg(long)]
        keyword: Option<String>,

        /// Rows in ranked lists
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("jobflow")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()?;
    if let Some(dir) = cli.local_dir {
        config.storage.backend = StorageBackend::Local;
        config.storage.local_dir = dir;
    }

    match cli.command {
        Command::Run {
            pages,
            per_page,
            what,
            format,
            force,
        } => {
            if let Some(pages) = pages {
                config.adzuna.max_pages = pages;
            }
            if let Some(per_page) = per_page {
                config.adzuna.per_page = per_page;
            }
            if let Some(what) = what {
                config.adzuna.what = what;
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            if force {
                config.output.skip_existing = false;
            }

            let pipeline = build_pipeline(&config).await?;
            let stats = pipeline.run(Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        },
        Command::Schedule => {
            let pipeline = build_pipeline(&config).await?;
            let scheduler = Scheduler::new(pipeline, config.schedule.clone());

            let report = scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Cannot listen for Ctrl-C, stopping");
                    }
                })
                .await;

            info!(
                succeeded = report.runs_succeeded,
                failed = report.runs_failed,
                "Scheduler stopped"
            );
        },
        Command::List { prefix } => {
            let store = build_store(&config.storage).await?;
            for key in store.list(&prefix).await? {
                println!("{}", key);
            }
        },
        Command::Report {
            date,
            category,
            keyword,
            top,
        } => {
            let store = build_store(&config.storage).await?;
            let snapshot = load_snapshot(store.as_ref(), date).await?;
            let options = ReportOptions {
                category,
                keyword,
                top,
            };
            let report = Report::build(&snapshot, &options);
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
    }

    Ok(())
}

async fn build_pipeline(config: &IngestConfig) -> Result<Pipeline> {
    config.validate_for_run()?;
    let client = AdzunaClient::new(config.adzuna.clone())?;
    let store = build_store(&config.storage).await?;

    info!(
        what = %config.adzuna.what,
        country = %config.adzuna.country,
        pages = config.adzuna.max_pages,
        format = %config.output.format,
        "Pipeline configured"
    );

    Ok(Pipeline::new(client, store, config.output.clone()))
}
