//! Queue-mediated market data ingestion.
//!
//! - [`harvester`]: turns active registry records into queued fetch jobs
//! - [`worker`] and [`pipeline`]: dequeue jobs and run the fetch strategies
//! - [`reporter`]: corrects the registry and alerts on permanent failures
//! - [`registrar`]: registers landed files as catalog partitions

pub mod error;
pub mod fetch;
pub mod glob;
pub mod harvester;
pub mod links;
pub mod listing;
pub mod pipeline;
pub mod registrar;
pub mod reporter;
pub mod schedule;
pub mod staging;
pub mod worker;

pub use error::{FetchError, HarvestError, RegistrarError};
pub use fetch::{Fetcher, RemoteFetcher};
pub use glob::GlobPattern;
pub use harvester::{HarvestReport, Harvester};
pub use links::{extract_links, LinkedFile};
pub use listing::parse_listing;
pub use pipeline::{JobOutcome, JobPipeline};
pub use registrar::{
    parse_file_timestamp, LandedFile, MarkerStore, PartitionRegistrar, RegistrationOutcome,
};
pub use reporter::{ErrorReporter, FailureReport, ReportOutcome};
pub use staging::{StagedFile, Staging};
pub use worker::{BatchReport, FetchWorker};
