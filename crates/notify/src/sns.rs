//! AWS SNS topic notifier.

use aws_credential_types::Credentials;
use aws_sdk_sns::config::BehaviorVersion;
use aws_sdk_sns::Client;
use tracing::{debug, info};

use marketfeed_core::config::AwsConfig;

use crate::traits::{Notification, Notifier, NotifyError};

/// Publishes notifications to a single SNS topic.
///
/// The notification body becomes the SNS message and the subject the SNS
/// subject, so email subscribers see the alert subject line.
pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(aws: &AwsConfig, topic_arn: impl Into<String>) -> Self {
        let region = aws_sdk_sns::config::Region::new(aws.region.clone());

        let mut sns_config = aws_sdk_sns::Config::builder()
            .region(region)
            .behavior_version(BehaviorVersion::latest());

        if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "marketfeed-notify-static",
            );
            sns_config = sns_config.credentials_provider(creds);
        }

        if let Some(endpoint) = aws.endpoint() {
            sns_config = sns_config.endpoint_url(&endpoint);
        }

        let topic_arn = topic_arn.into();
        info!(topic_arn = %topic_arn, region = %aws.region, "SNS notifier initialized");

        Self {
            client: Client::from_conf(sns_config.build()),
            topic_arn,
        }
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

#[async_trait::async_trait]
impl Notifier for SnsNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let resp = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(truncate_subject(&notification.subject))
            .message(&notification.body)
            .send()
            .await
            .map_err(|e| NotifyError::Sns(e.to_string()))?;

        debug!(
            topic_arn = %self.topic_arn,
            message_id = resp.message_id().unwrap_or_default(),
            "SNS notification published"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "sns"
    }
}

/// SNS rejects subjects longer than 100 characters.
fn truncate_subject(subject: &str) -> String {
    subject.chars().take(100).collect()
}
