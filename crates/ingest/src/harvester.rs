//! Harvester: eligible registry records in, resolved job messages out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use marketfeed_core::{JobMessage, SourceRecord, TemplateVars};
use marketfeed_queue::QueueProducer;
use marketfeed_storage::SourceRegistry;

use crate::error::HarvestError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarvestReport {
    pub eligible: usize,
    pub sent: usize,
    /// Eligible records whose templates could not be resolved.
    pub skipped: usize,
    /// Sends that failed; retried only by the next scheduled run.
    pub failed: usize,
}

pub struct Harvester {
    registry: Arc<SourceRegistry>,
    producer: Arc<dyn QueueProducer>,
    interval: String,
}

impl Harvester {
    pub fn new(
        registry: Arc<SourceRegistry>,
        producer: Arc<dyn QueueProducer>,
        interval: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            producer,
            interval: interval.into(),
        }
    }

    /// Job messages for every active record of `interval`, resolved at
    /// `now` shifted by each record's UTC offset.
    pub fn plan(records: &[SourceRecord], interval: &str, now: DateTime<Utc>) -> Vec<JobMessage> {
        records
            .iter()
            .filter(|r| r.is_eligible(interval))
            .filter_map(|record| {
                let vars = TemplateVars::for_offset(now, record.utc_offset_hours);
                match JobMessage::from_record(record, &vars) {
                    Ok(msg) => Some(msg),
                    Err(e) => {
                        warn!(source_id = %record.id, error = %e, "Skipping record with bad template");
                        None
                    }
                }
            })
            .collect()
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<HarvestReport, HarvestError> {
        let records = self.registry.load().await?;
        let eligible = records.iter().filter(|r| r.is_eligible(&self.interval)).count();
        let jobs = Self::plan(&records, &self.interval, now);

        let mut report = HarvestReport {
            eligible,
            skipped: eligible - jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            let body = match job.to_json() {
                Ok(body) => body,
                Err(e) => {
                    warn!(source_id = %job.id, error = %e, "Failed to encode job");
                    report.failed += 1;
                    continue;
                }
            };
            match self.producer.send(&body).await {
                Ok(message_id) => {
                    debug!(source_id = %job.id, url = %job.url, message_id = %message_id, "Appending");
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(source_id = %job.id, url = %job.url, error = %e, "Failed to enqueue job");
                    report.failed += 1;
                }
            }
        }

        info!(
            interval = %self.interval,
            eligible = report.eligible,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Harvest finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marketfeed_core::SourceStatus;

    fn record(id: &str, status: SourceStatus, interval: &str, url: &str, offset: i64) -> SourceRecord {
        SourceRecord {
            id: id.into(),
            url_template: url.into(),
            interval: interval.into(),
            status,
            kind: "DIRECT".into(),
            pattern_template: "file_{year}{month}{day}.csv".into(),
            utc_offset_hours: offset,
            utc_offset_raw: offset.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 10, 31, 20, 30, 0).unwrap()
    }

    #[test]
    fn only_active_records_of_the_interval() {
        let records = vec![
            record("1", SourceStatus::Active, "daily", "http://a/", 0),
            record("2", SourceStatus::Inactive, "daily", "http://b/", 0),
            record("3", SourceStatus::NeedsFix, "daily", "http://c/", 0),
            record("4", SourceStatus::Active, "hourly", "http://d/", 0),
        ];
        let jobs = Harvester::plan(&records, "daily", now());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "1");
    }

    #[test]
    fn placeholders_resolve_with_offset() {
        let records = vec![record(
            "5",
            SourceStatus::Active,
            "daily",
            "http://x/{year}/{month}/{day}/{hour}{minute}/{lastmonth}",
            10,
        )];
        let jobs = Harvester::plan(&records, "daily", now());
        // 20:30 UTC + 10h rolls into November.
        assert_eq!(jobs[0].url, "http://x/2017/11/01/0630/010");
        assert_eq!(jobs[0].pattern, "file_20171101.csv");
        assert_eq!(jobs[0].utc_offset, "10");
        assert!(!jobs[0].url.contains('{'));
    }

    #[test]
    fn bad_template_skips_only_that_record() {
        let records = vec![
            record("1", SourceStatus::Active, "daily", "http://x/{week}", 0),
            record("2", SourceStatus::Active, "daily", "http://y/{day}", 0),
        ];
        let jobs = Harvester::plan(&records, "daily", now());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "http://y/31");
    }

    #[test]
    fn plan_is_deterministic() {
        let records = vec![record("1", SourceStatus::Active, "daily", "http://x/{year}{month}", 0)];
        assert_eq!(
            Harvester::plan(&records, "daily", now()),
            Harvester::plan(&records, "daily", now())
        );
    }
}
