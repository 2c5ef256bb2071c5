//! harvest-worker: scans the source registry and enqueues fetch jobs.
//!
//! Runs one harvest pass and exits, or keeps running on a cron schedule
//! when `--schedule` / `HARVEST_SCHEDULE` is set.

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};

use marketfeed_core::config::{load_dotenv, Config};
use marketfeed_ingest::schedule::{parse_cron, until_next};
use marketfeed_ingest::Harvester;
use marketfeed_queue::SqsQueue;
use marketfeed_storage::{SourceRegistry, StorageBackend};

// ── CLI ─────────────────────────────────────────────────────────────

/// Harvest worker: turns active registry records into queued fetch jobs.
#[derive(Parser, Debug)]
#[command(name = "harvest-worker", version, about)]
struct Cli {
    /// Interval tag to harvest (overrides HARVEST_INTERVAL).
    #[arg(long)]
    interval: Option<String>,

    /// Cron expression (5 or 6 fields), overriding HARVEST_SCHEDULE.
    /// Runs a single pass when neither is set.
    #[arg(long)]
    schedule: Option<String>,

    /// Print the jobs that would be sent instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_summary();

    let interval = cli.interval.unwrap_or_else(|| config.harvest.interval.clone());
    let backend = StorageBackend::from_config(&config.aws, &config.storage);
    let registry = Arc::new(SourceRegistry::from_config(&backend, &config.registry)?);

    if cli.dry_run {
        let records = registry.load().await?;
        for job in Harvester::plan(&records, &interval, Utc::now()) {
            println!("{}", job.to_json()?);
        }
        return Ok(());
    }

    let queue = Arc::new(SqsQueue::new(&config.aws, &config.queue)?);
    let harvester = Harvester::new(registry, queue, interval);

    let Some(expr) = config.harvest.schedule_or(cli.schedule) else {
        harvester.run(Utc::now()).await?;
        return Ok(());
    };

    let schedule = parse_cron(&expr)?;
    info!(schedule = %expr, "harvest worker running on schedule");
    loop {
        let Some(wait) = until_next(&schedule, Utc::now()) else {
            info!("schedule has no further fire times, exiting");
            return Ok(());
        };
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                return Ok(());
            }
        }
        if let Err(e) = harvester.run(Utc::now()).await {
            error!(error = %e, "harvest pass failed");
        }
    }
}
