//! fetch-worker: receives fetch jobs from the queue and lands the files.
//!
//! Runs one batch and exits, or polls every `--poll-interval-secs`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use marketfeed_core::config::{load_dotenv, Config};
use marketfeed_ingest::{ErrorReporter, FetchWorker, JobPipeline, RemoteFetcher, Staging};
use marketfeed_notify::Dispatcher;
use marketfeed_queue::{QueueConsumer, SqsQueue};
use marketfeed_storage::{SourceRegistry, StorageBackend};

// ── CLI ─────────────────────────────────────────────────────────────

/// Fetch worker: executes queued LINKS / DIRECT / FTP jobs.
#[derive(Parser, Debug)]
#[command(name = "fetch-worker", version, about)]
struct Cli {
    /// Receive calls per batch (overrides FETCH_BATCH_SIZE).
    #[arg(long)]
    batch_size: Option<u32>,

    /// Seconds between batches. Runs a single batch when absent.
    #[arg(long, env = "FETCH_POLL_INTERVAL_SECS")]
    poll_interval_secs: Option<u64>,
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

    let queue: Arc<dyn QueueConsumer> = Arc::new(SqsQueue::new(&config.aws, &config.queue)?);
    match queue.health_check().await {
        Ok(health) => info!(%health, "queue reachable"),
        Err(e) => warn!(error = %e, "queue health check failed"),
    }

    let backend = StorageBackend::from_config(&config.aws, &config.storage);
    let registry = Arc::new(SourceRegistry::from_config(&backend, &config.registry)?);
    let alerts = Arc::new(Dispatcher::from_config(&config.aws, &config.alert)?);
    let reporter = ErrorReporter::new(registry, alerts, queue.clone(), config.alert.subject.clone());

    let pipeline = JobPipeline::new(
        Arc::new(RemoteFetcher::new()?),
        backend.open(&config.landing.bucket)?,
        config.landing.root.clone(),
        Staging::new(config.landing.staging_dir.clone()),
        queue.clone(),
        reporter,
    );
    let batch_size = cli.batch_size.unwrap_or(config.queue.batch_size);
    let worker = FetchWorker::new(queue, pipeline, batch_size);

    let Some(secs) = cli.poll_interval_secs else {
        worker.run_batch().await;
        return Ok(());
    };

    info!(poll_interval_secs = secs, batch_size, "fetch worker polling");
    loop {
        worker.run_batch().await;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                return Ok(());
            }
        }
    }
}
