//! Fetch worker: bounded batch of receive calls, one job at a time.

use std::sync::Arc;

use tracing::{debug, info, warn};

use marketfeed_core::{CoreError, FetchJob, Job, JobMessage};
use marketfeed_queue::{QueueConsumer, QueueMessage};

use crate::pipeline::{JobOutcome, JobPipeline};

/// Tally of one [`FetchWorker::run_batch`] invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub empty_polls: usize,
    pub poll_errors: usize,
    /// Undecodable or unknown-type messages, left on the queue.
    pub rejected: usize,
    pub completed: usize,
    pub abandoned: usize,
    pub reported: usize,
}

pub struct FetchWorker {
    queue: Arc<dyn QueueConsumer>,
    pipeline: JobPipeline,
    batch_size: u32,
}

impl FetchWorker {
    pub fn new(queue: Arc<dyn QueueConsumer>, pipeline: JobPipeline, batch_size: u32) -> Self {
        Self {
            queue,
            pipeline,
            batch_size,
        }
    }

    /// Decode a queue message into a typed job.
    pub fn decode(message: &QueueMessage) -> Result<FetchJob, CoreError> {
        let job = Job::try_from(JobMessage::from_json(&message.body)?)?;
        Ok(FetchJob {
            job,
            receipt_handle: message.receipt_handle.clone(),
        })
    }

    /// Make `batch_size` single-message receive calls and run each job.
    pub async fn run_batch(&self) -> BatchReport {
        let mut report = BatchReport::default();
        debug!(batch_size = self.batch_size, "Attempting to receive messages");

        for _ in 0..self.batch_size {
            let messages = match self.queue.poll_batch(1).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(error = %e, "Receive failed");
                    report.poll_errors += 1;
                    continue;
                }
            };
            if messages.is_empty() {
                report.empty_polls += 1;
                continue;
            }

            for message in messages {
                report.received += 1;
                let fetch_job = match Self::decode(&message) {
                    Ok(job) => job,
                    Err(e) => {
                        // Left unacked; the queue redelivers or expires it.
                        warn!(message_id = %message.id, error = %e, body = %message.body, "Rejected job message");
                        report.rejected += 1;
                        continue;
                    }
                };

                match self
                    .pipeline
                    .execute(&fetch_job.job, &fetch_job.receipt_handle)
                    .await
                {
                    JobOutcome::Completed { .. } => report.completed += 1,
                    JobOutcome::Abandoned { .. } => report.abandoned += 1,
                    JobOutcome::Reported { .. } => report.reported += 1,
                }
            }
        }

        info!(
            received = report.received,
            completed = report.completed,
            abandoned = report.abandoned,
            reported = report.reported,
            rejected = report.rejected,
            "Fetch batch finished"
        );
        report
    }
}
