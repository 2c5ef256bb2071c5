//! Alert delivery to an HTTP endpoint as a JSON POST.

use crate::traits::{Notification, Notifier, NotifyError};

/// Posts each alert as `{"subject", "body", "metadata"}` to one URL.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url '{url}': {e}")))?;
        Ok(Self {
            url,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %self.url, %status, body = %body, "Alert webhook returned non-2xx status");
            return Err(NotifyError::Config(format!("webhook returned {status}: {body}")));
        }

        tracing::debug!(url = %self.url, %status, "Alert webhook delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
