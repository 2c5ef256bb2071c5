//! AWS Athena statement execution client.
//!
//! Provides [`AthenaClient`] for submitting DDL statements (repair, add
//! partition) with exponential-backoff polling and timeout enforcement.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use aws_config::BehaviorVersion;
use aws_sdk_athena::types::{
    EncryptionConfiguration, EncryptionOption, QueryExecutionContext, QueryExecutionState,
    ResultConfiguration,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogStatement;
use crate::config::AthenaConfig;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors that can occur during Athena operations.
#[derive(Debug, thiserror::Error)]
pub enum AthenaError {
    /// The statement execution failed on the Athena side.
    #[error("Query {query_id} failed: {reason}")]
    QueryFailed { query_id: String, reason: String },

    /// The statement was cancelled (either by a user or by Athena).
    #[error("Query {query_id} was cancelled")]
    QueryCancelled { query_id: String },

    /// The statement exceeded the configured timeout.
    #[error("Query {query_id} timed out after {seconds}s")]
    QueryTimeout { query_id: String, seconds: u32 },

    /// An AWS SDK error (stringified).
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

/// Execution metadata for a submitted statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// Athena query execution ID.
    pub query_id: String,
    /// Final (or last observed) execution state.
    pub state: String,
    /// Engine execution time in milliseconds, when known.
    pub execution_time_ms: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AthenaClient {
    config: AthenaConfig,
    athena_client: aws_sdk_athena::Client,
}

impl AthenaClient {
    /// Create a new [`AthenaClient`] using the region in `config`.
    pub async fn new(config: AthenaConfig) -> Self {
        let region = aws_sdk_athena::config::Region::new(config.region.clone());
        let aws_cfg = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        let athena_client = aws_sdk_athena::Client::new(&aws_cfg);

        info!(
            region = %config.region,
            workgroup = %config.workgroup,
            wait = config.wait_for_completion,
            "AthenaClient initialised"
        );

        Self {
            config,
            athena_client,
        }
    }

    pub fn config(&self) -> &AthenaConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Submit a statement and, when configured, wait for it to finish.
    pub async fn execute(&self, statement: &CatalogStatement) -> Result<QueryMetadata, AthenaError> {
        let query_id = self.submit(statement).await?;

        if !self.config.wait_for_completion {
            return Ok(QueryMetadata {
                query_id,
                state: "QUEUED".to_string(),
                execution_time_ms: 0,
            });
        }

        let qe = self.poll_until_complete(&query_id).await?;
        Ok(QueryMetadata {
            query_id,
            state: "SUCCEEDED".to_string(),
            execution_time_ms: qe
                .statistics()
                .and_then(|s| s.engine_execution_time_in_millis())
                .unwrap_or(0) as u64,
        })
    }

    /// Start a statement and return its execution id.
    pub async fn submit(&self, statement: &CatalogStatement) -> Result<String, AthenaError> {
        info!(
            sql = %statement.sql,
            database = %statement.database,
            output = %statement.output_location,
            "Submitting Athena statement"
        );

        let encryption = EncryptionConfiguration::builder()
            .encryption_option(EncryptionOption::SseS3)
            .build()
            .map_err(|e| AthenaError::AwsSdk(e.to_string()))?;

        let start_resp = self
            .athena_client
            .start_query_execution()
            .query_string(&statement.sql)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&statement.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&statement.output_location)
                    .encryption_configuration(encryption)
                    .build(),
            )
            .work_group(&self.config.workgroup)
            .send()
            .await
            .map_err(|e| AthenaError::AwsSdk(e.to_string()))?;

        let query_id = start_resp
            .query_execution_id()
            .ok_or_else(|| AthenaError::AwsSdk("No query execution ID returned".into()))?
            .to_string();

        info!(query_id = %query_id, "Statement execution started");
        Ok(query_id)
    }

    /// Cancel a running statement.
    pub async fn cancel_query(&self, query_id: &str) -> Result<(), AthenaError> {
        info!(query_id = %query_id, "Cancelling query");

        self.athena_client
            .stop_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(|e| AthenaError::AwsSdk(e.to_string()))?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Poll `GetQueryExecution` with exponential backoff until the statement
    /// reaches a terminal state or the configured timeout is exceeded.
    async fn poll_until_complete(
        &self,
        query_id: &str,
    ) -> Result<aws_sdk_athena::types::QueryExecution, AthenaError> {
        let start = Instant::now();
        let timeout = Duration::from_secs(self.config.timeout_seconds as u64);

        let max_delay_ms: u64 = 2000;
        let backoff_factor: f64 = 1.5;
        let mut delay_ms: u64 = 200;

        loop {
            let resp = self
                .athena_client
                .get_query_execution()
                .query_execution_id(query_id)
                .send()
                .await
                .map_err(|e| AthenaError::AwsSdk(e.to_string()))?;

            let qe = resp
                .query_execution()
                .ok_or_else(|| AthenaError::AwsSdk("No query execution in response".into()))?
                .clone();

            let state = qe
                .status()
                .and_then(|s| s.state())
                .cloned()
                .unwrap_or(QueryExecutionState::Queued);

            debug!(
                query_id = %query_id,
                state = ?state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling statement status"
            );

            match state {
                QueryExecutionState::Succeeded => return Ok(qe),

                QueryExecutionState::Failed => {
                    let reason = qe
                        .status()
                        .and_then(|s| s.state_change_reason())
                        .unwrap_or("unknown")
                        .to_string();

                    error!(query_id = %query_id, reason = %reason, "Statement failed");
                    return Err(AthenaError::QueryFailed {
                        query_id: query_id.to_string(),
                        reason,
                    });
                }

                QueryExecutionState::Cancelled => {
                    warn!(query_id = %query_id, "Statement was cancelled");
                    return Err(AthenaError::QueryCancelled {
                        query_id: query_id.to_string(),
                    });
                }

                // Queued | Running | unknown future variant
                _ => {}
            }

            if start.elapsed() > timeout {
                warn!(
                    query_id = %query_id,
                    timeout_seconds = self.config.timeout_seconds,
                    "Statement timed out, cancelling"
                );
                // Best-effort cancel; the timeout is the error we report.
                let _ = self.cancel_query(query_id).await;
                return Err(AthenaError::QueryTimeout {
                    query_id: query_id.to_string(),
                    seconds: self.config.timeout_seconds,
                });
            }

            tokio::time::sleep(Duration::from_millis(delay_ms + jitter_ms())).await;
            delay_ms = ((delay_ms as f64 * backoff_factor) as u64).min(max_delay_ms);
        }
    }
}

/// Jitter in `[0, 100)` ms from the sub-second clock.
fn jitter_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64
        % 100
}

// ---------------------------------------------------------------------------
// Tests (no AWS calls)
// ---------------------------------------------------------------------------
