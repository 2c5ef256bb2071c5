//! partition-worker: registers landed files as catalog partitions.
//!
//! Input is an S3 event notification (`--event <file>`, `-` for stdin) or a
//! single object given as `--bucket` and `--key`.

use std::io::Read;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use marketfeed_athena::{AthenaCatalog, AthenaClient, AthenaConfig};
use marketfeed_core::config::{load_dotenv, Config};
use marketfeed_ingest::{LandedFile, PartitionRegistrar};
use marketfeed_storage::StorageBackend;

// ── CLI ─────────────────────────────────────────────────────────────

/// Partition worker: repair once per bucket, then add one partition per file.
#[derive(Parser, Debug)]
#[command(name = "partition-worker", version, about)]
struct Cli {
    /// Path to an S3 event notification JSON file, or `-` for stdin.
    #[arg(long, conflicts_with_all = ["bucket", "key"])]
    event: Option<String>,

    /// Bucket the file landed in.
    #[arg(long, requires = "key")]
    bucket: Option<String>,

    /// Object key of the landed file.
    #[arg(long, requires = "bucket")]
    key: Option<String>,
}

impl Cli {
    fn landed_files(&self) -> anyhow::Result<Vec<LandedFile>> {
        if let (Some(bucket), Some(key)) = (&self.bucket, &self.key) {
            return Ok(vec![LandedFile::new(bucket.clone(), key.clone())]);
        }
        let json = match self.event.as_deref() {
            Some("-") => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            }
            Some(path) => std::fs::read_to_string(path)?,
            None => anyhow::bail!("either --event or --bucket/--key is required"),
        };
        Ok(LandedFile::from_s3_event(&json)?)
    }
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
    let athena_config = AthenaConfig::from_env();
    info!(
        stack = %athena_config.stack_name,
        database = %athena_config.database_name,
        "partition worker starting"
    );

    let landed = cli.landed_files()?;

    let backend = StorageBackend::from_config(&config.aws, &config.storage);
    let markers = Arc::new(backend.open(&athena_config.marker_bucket())?);
    let catalog = Arc::new(AthenaCatalog::new(AthenaClient::new(athena_config).await));
    let registrar = PartitionRegistrar::new(markers, catalog);

    let mut failures = 0;
    for file in &landed {
        match registrar.handle(file).await {
            Ok(outcome) => info!(bucket = %file.bucket, key = %file.key, ?outcome, "landed file handled"),
            Err(e) => {
                error!(bucket = %file.bucket, key = %file.key, error = %e, "landed file not registered");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} landed files not registered", landed.len());
    }
    Ok(())
}
