//! Fetch strategies: discover, fetch, store, ack, clean up.
//!
//! The message is acked after every stored file, not once per job. A
//! multi-file job that fails on file k of n has already been deleted from
//! the queue, so files k..n wait for the next harvest. Only discovery
//! failures and single-file failures go through the [`ErrorReporter`].

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use marketfeed_core::{Job, JobKind};
use marketfeed_queue::QueueConsumer;
use marketfeed_storage::BlobStore;

use crate::error::FetchError;
use crate::fetch::Fetcher;
use crate::glob::GlobPattern;
use crate::links::{extract_links, LinkedFile};
use crate::listing::parse_listing;
use crate::reporter::{ErrorReporter, FailureReport};
use crate::staging::Staging;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every discovered file was stored (possibly none).
    Completed { stored: usize },
    /// A file of a multi-file job failed; the rest of the job was dropped.
    Abandoned {
        stored: usize,
        file: String,
        error: String,
    },
    /// The failure went to the error reporter.
    Reported { error: String },
}

pub struct JobPipeline {
    fetcher: Arc<dyn Fetcher>,
    landing: BlobStore,
    root: String,
    staging: Staging,
    queue: Arc<dyn QueueConsumer>,
    reporter: ErrorReporter,
}

impl JobPipeline {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        landing: BlobStore,
        root: impl Into<String>,
        staging: Staging,
        queue: Arc<dyn QueueConsumer>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            fetcher,
            landing,
            root: root.into(),
            staging,
            queue,
            reporter,
        }
    }

    /// Landing key for a file fetched by a job of `kind`.
    pub fn landing_key(&self, kind: JobKind, file_name: &str) -> String {
        format!("{}/{}/{}", self.root, kind.key_prefix(), file_name)
    }

    pub async fn execute(&self, job: &Job, receipt: &str) -> JobOutcome {
        info!(source_id = %job.id(), url = %job.url(), kind = %job.kind(), "Start handling job");

        let outcome = match job {
            Job::LinkScrape { id, url, .. } => match self.discover_links(url).await {
                Ok(files) => self.store_all(job.kind(), files, receipt).await,
                Err(e) => self.report(id, url, e, receipt).await,
            },
            Job::FtpListing { id, url, pattern } => match self.discover_listing(url, pattern).await {
                Ok(files) => self.store_all(job.kind(), files, receipt).await,
                Err(e) => self.report(id, url, e, receipt).await,
            },
            Job::Direct { id, url, file_name } | Job::DirectFtp { id, url, file_name } => {
                match self.store_one(job.kind(), url, file_name, receipt).await {
                    Ok(()) => JobOutcome::Completed { stored: 1 },
                    Err(e) => self.report(id, url, e, receipt).await,
                }
            }
        };

        match &outcome {
            JobOutcome::Completed { stored } => {
                info!(source_id = %job.id(), stored, "Finished job");
            }
            JobOutcome::Abandoned { stored, file, error } => {
                warn!(source_id = %job.id(), stored, file = %file, error = %error, "Error when handling file, rest of job dropped");
            }
            JobOutcome::Reported { .. } => {}
        }
        outcome
    }

    // ── Discovery ───────────────────────────────────────────────────

    async fn discover_links(&self, url: &str) -> Result<Vec<LinkedFile>, FetchError> {
        let base = parse_base(url)?;
        let page = self.fetcher.fetch(url).await?;
        let html = String::from_utf8_lossy(&page);
        Ok(extract_links(&html, &base))
    }

    async fn discover_listing(&self, url: &str, pattern: &str) -> Result<Vec<LinkedFile>, FetchError> {
        let base = parse_base(url)?;
        let glob = GlobPattern::new(pattern)?;
        let lines = self.fetcher.list(url).await?;
        let names = glob.filter(parse_listing(&lines));

        names
            .into_iter()
            .map(|file_name| {
                let resolved = base.join(&file_name).map_err(|e| FetchError::InvalidUrl {
                    url: file_name.clone(),
                    reason: e.to_string(),
                })?;
                Ok(LinkedFile {
                    url: resolved.to_string(),
                    file_name,
                })
            })
            .collect()
    }

    // ── Storing ─────────────────────────────────────────────────────

    async fn store_all(&self, kind: JobKind, files: Vec<LinkedFile>, receipt: &str) -> JobOutcome {
        let mut stored = 0;
        for file in files {
            if let Err(e) = self.store_one(kind, &file.url, &file.file_name, receipt).await {
                return JobOutcome::Abandoned {
                    stored,
                    file: file.file_name,
                    error: e.to_string(),
                };
            }
            stored += 1;
        }
        JobOutcome::Completed { stored }
    }

    /// Fetch one file, land it, ack the message, drop the staging copy.
    async fn store_one(
        &self,
        kind: JobKind,
        url: &str,
        file_name: &str,
        receipt: &str,
    ) -> Result<(), FetchError> {
        let data = self.fetcher.fetch(url).await?;
        let staged = self.staging.stage(file_name, &data).await?;

        let key = self.landing_key(kind, file_name);
        if let Err(e) = self.landing.put_file(&key, staged.path()).await {
            staged.remove().await;
            return Err(e.into());
        }
        info!(bucket = %self.landing.bucket(), key = %key, bytes = data.len(), "Stored file");

        let acked = self.queue.ack(receipt).await;
        staged.remove().await;
        acked?;
        Ok(())
    }

    async fn report(&self, id: &str, url: &str, error: FetchError, receipt: &str) -> JobOutcome {
        let failure = FailureReport::new(id, url, &error);
        self.reporter.report(&failure, receipt).await;
        JobOutcome::Reported {
            error: error.to_string(),
        }
    }
}

fn parse_base(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
