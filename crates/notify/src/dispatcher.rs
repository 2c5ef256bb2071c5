//! Routes notifications to configured channels.
//!
//! The dispatcher delivers each notification to every configured channel.
//! Individual channel failures don't block other channels.

use marketfeed_core::config::{AlertConfig, AwsConfig};
use tracing::info;

use crate::sns::SnsNotifier;
use crate::traits::{DispatchResult, Notification, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Fans a notification out to a fixed set of channels.
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Create a dispatcher with no channels; every dispatch is a no-op.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Build the SNS and webhook channels named by the alert config.
    pub fn from_config(aws: &AwsConfig, alert: &AlertConfig) -> Result<Self, NotifyError> {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(ref arn) = alert.topic_arn {
            channels.push(Box::new(SnsNotifier::new(aws, arn.clone())));
        }
        if let Some(ref url) = alert.webhook_url {
            channels.push(Box::new(WebhookNotifier::new(url)?));
        }
        info!(channels = channels.len(), "Alert dispatcher configured");
        Ok(Self::new(channels))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Dispatch a notification to all channels.
    ///
    /// Returns results for each channel delivery.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::debug!(subject = %notification.subject, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }
}
