//! Terminal failure handling: registry correction, operator alert, ack.

use std::sync::Arc;

use tracing::{error, info, warn};

use marketfeed_notify::{Dispatcher, Notification};
use marketfeed_queue::QueueConsumer;
use marketfeed_storage::SourceRegistry;

/// The failing job as seen by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub id: String,
    pub url: String,
    pub reason: String,
}

impl FailureReport {
    pub fn new(id: impl Into<String>, url: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Alert body; double quotes in the reason become single quotes.
    pub fn alert_message(&self) -> String {
        let reason = self.reason.replace('"', "'");
        format!(
            r#"{{"ID": "{}", "URL": "{}", "REASON": "{}"}}, "MESSAGE": "The URL in the source file should has been labelled as Active: 2 ""#,
            self.id, self.url, reason
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    pub registry_updated: bool,
    pub alerts_delivered: usize,
    pub acked: bool,
}

pub struct ErrorReporter {
    registry: Arc<SourceRegistry>,
    alerts: Arc<Dispatcher>,
    queue: Arc<dyn QueueConsumer>,
    subject: String,
}

impl ErrorReporter {
    pub fn new(
        registry: Arc<SourceRegistry>,
        alerts: Arc<Dispatcher>,
        queue: Arc<dyn QueueConsumer>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            alerts,
            queue,
            subject: subject.into(),
        }
    }

    /// Mark the source as needing a fix, alert, and ack `receipt`.
    ///
    /// Each step runs whether or not the previous one succeeded.
    pub async fn report(&self, failure: &FailureReport, receipt: &str) -> ReportOutcome {
        warn!(source_id = %failure.id, url = %failure.url, reason = %failure.reason, "Reporting failed job");

        let registry_updated = match self.registry.mark_needs_fix(&failure.id).await {
            Ok(0) => {
                warn!(source_id = %failure.id, "Failed source not found in registry");
                true
            }
            Ok(_) => true,
            Err(e) => {
                error!(source_id = %failure.id, error = %e, "Error when modifying source registry");
                false
            }
        };

        let notification = Notification::new(&self.subject, failure.alert_message())
            .with_meta("source_id", &failure.id)
            .with_meta("url", &failure.url);
        let alerts_delivered = self
            .alerts
            .dispatch(&notification)
            .await
            .iter()
            .filter(|r| r.success)
            .count();

        let acked = match self.queue.ack(receipt).await {
            Ok(()) => true,
            Err(e) => {
                error!(source_id = %failure.id, error = %e, "Failed to delete reported message");
                false
            }
        };

        info!(
            source_id = %failure.id,
            registry_updated,
            alerts_delivered,
            acked,
            "Failure reported"
        );

        ReportOutcome {
            registry_updated,
            alerts_delivered,
            acked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_message_matches_operator_format() {
        let failure = FailureReport::new("12", "http://x/a.zip", "HTTP Error 404: Not Found");
        assert_eq!(
            failure.alert_message(),
            r#"{"ID": "12", "URL": "http://x/a.zip", "REASON": "HTTP Error 404: Not Found"}, "MESSAGE": "The URL in the source file should has been labelled as Active: 2 ""#
        );
    }

    #[test]
    fn quotes_in_reason_are_neutralised() {
        let failure = FailureReport::new("1", "u", r#"bad "thing" happened"#);
        assert!(failure.alert_message().contains(r#""REASON": "bad 'thing' happened""#));
    }
}
