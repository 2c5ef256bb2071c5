//! AWS SQS queue implementation.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use chrono::{TimeZone, Utc};
use tracing::{debug, info};

use marketfeed_core::config::{AwsConfig, QueueConfig};

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage, QueueProducer};
use crate::error::QueueError;

/// SQS limits: 20 s long poll, 12 h visibility.
const MAX_WAIT_TIME_SECS: u32 = 20;
const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 43_200;

/// SQS-backed job queue (both producer and consumer).
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    wait_time_secs: i32,
    visibility_timeout_secs: i32,
}

impl SqsQueue {
    /// Create a new SQS queue handle from project config.
    pub fn new(aws: &AwsConfig, queue: &QueueConfig) -> Result<Self, QueueError> {
        let region = aws_sdk_sqs::config::Region::new(aws.region.clone());

        // Build the client config directly so a shared AWS_ENDPOINT_URL aimed
        // at another service is only applied when explicitly configured here.
        let mut sqs_config = aws_sdk_sqs::Config::builder()
            .region(region)
            .behavior_version(BehaviorVersion::latest());

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "marketfeed-queue-static",
            );
            sqs_config = sqs_config.credentials_provider(creds);
        }

        if let Some(endpoint) = aws.endpoint() {
            sqs_config = sqs_config.endpoint_url(&endpoint);
        }

        let client = Client::from_conf(sqs_config.build());

        info!(
            queue_url = %queue.queue_url,
            region = %aws.region,
            "SQS queue initialized"
        );

        Ok(Self {
            client,
            queue_url: queue.queue_url.clone(),
            wait_time_secs: queue.wait_time_secs.min(MAX_WAIT_TIME_SECS) as i32,
            visibility_timeout_secs: queue.visibility_timeout_secs.min(MAX_VISIBILITY_TIMEOUT_SECS)
                as i32,
        })
    }
}

#[async_trait]
impl QueueConsumer for SqsQueue {
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        // SQS caps at 10 messages per request.
        let capped = max_messages.clamp(1, 10) as i32;

        debug!(max_messages = capped, "Polling SQS");

        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(capped)
            .wait_time_seconds(self.wait_time_secs)
            .visibility_timeout(self.visibility_timeout_secs)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS receive failed: {e:?}")))?;

        let sqs_messages = resp.messages.unwrap_or_default();
        debug!(count = sqs_messages.len(), "Received SQS messages");

        let mut messages = Vec::with_capacity(sqs_messages.len());
        for msg in sqs_messages {
            let id = msg.message_id().unwrap_or("unknown").to_string();
            let body = msg.body().unwrap_or("").to_string();

            let receipt_handle = msg
                .receipt_handle()
                .ok_or_else(|| QueueError::Parse("missing receipt handle".into()))?
                .to_string();

            // SentTimestamp is epoch millis.
            let timestamp = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::SentTimestamp))
                .and_then(|ts| ts.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(Utc::now);

            let attempt_count = msg
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|c| c.parse::<u32>().ok())
                .unwrap_or(1);

            messages.push(QueueMessage {
                id,
                body,
                receipt_handle,
                timestamp,
                attempt_count,
            });
        }

        Ok(messages)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        debug!(receipt_handle, "Deleting SQS message");

        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Ack(format!("SQS delete failed: {e:?}")))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS health check failed: {e:?}")))?;

        let count = resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse::<u64>().ok());

        Ok(QueueHealth {
            connected: true,
            approximate_message_count: count,
            provider: "sqs".to_string(),
        })
    }
}

#[async_trait]
impl QueueProducer for SqsQueue {
    async fn send(&self, body: &str) -> Result<String, QueueError> {
        let resp = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::Send(format!("SQS send failed: {e:?}")))?;

        let message_id = resp.message_id().unwrap_or("unknown").to_string();
        debug!(message_id = %message_id, "Sent SQS message");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aws() -> AwsConfig {
        AwsConfig {
            region: "ap-southeast-2".into(),
            account_id: None,
            access_key_id: Some("AKID".into()),
            secret_access_key: Some("secret".into()),
            session_token: None,
            endpoint_url: Some("http://localhost:4566".into()),
        }
    }

    fn queue(wait: u32, visibility: u32) -> QueueConfig {
        QueueConfig {
            queue_url: "http://localhost:4566/000000000000/jobs".into(),
            wait_time_secs: wait,
            visibility_timeout_secs: visibility,
            batch_size: 5,
        }
    }

    #[test]
    fn timeouts_within_limits_are_kept() {
        let q = SqsQueue::new(&aws(), &queue(0, 300)).unwrap();
        assert_eq!(q.wait_time_secs, 0);
        assert_eq!(q.visibility_timeout_secs, 300);
    }

    #[test]
    fn oversized_timeouts_are_clamped() {
        let q = SqsQueue::new(&aws(), &queue(60, u32::MAX)).unwrap();
        assert_eq!(q.wait_time_secs, 20);
        assert_eq!(q.visibility_timeout_secs, 43_200);
    }
}
