//! Partition registration for landed files.
//!
//! Per landed bucket there are two states, told apart only by the completion
//! marker object. Without a marker the first event runs a full repair and
//! writes the marker. With a marker every event adds one partition keyed by
//! the timestamp embedded in the file name.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{error, info, warn};

use marketfeed_athena::{PartitionCatalog, PartitionKey};
use marketfeed_storage::{BlobStore, StorageError};

use crate::error::RegistrarError;

/// One object newly present in a landing bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandedFile {
    pub bucket: String,
    pub key: String,
    pub discovered_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct S3Event {
    #[serde(rename = "Records", default)]
    records: Vec<S3EventRecord>,
}

#[derive(Deserialize)]
struct S3EventRecord {
    #[serde(rename = "eventTime", default)]
    event_time: Option<DateTime<Utc>>,
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Deserialize)]
struct S3Object {
    key: String,
}

impl LandedFile {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            discovered_at: None,
        }
    }

    /// Every record of an S3 event notification, in order.
    pub fn from_s3_event(json: &str) -> Result<Vec<Self>, RegistrarError> {
        let event: S3Event = serde_json::from_str(json)?;
        if event.records.is_empty() {
            return Err(RegistrarError::Event("event has no records".into()));
        }
        Ok(event
            .records
            .into_iter()
            .map(|r| Self {
                bucket: r.s3.bucket.name,
                key: r.s3.object.key,
                discovered_at: r.event_time,
            })
            .collect())
    }

    /// Last path segment of the object key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Eleven ASCII digits; the slicing below assumes one byte per digit.
static FILE_STAMP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[0-9]{11}").ok());

/// Timestamp encoded by the first 11-digit run in `file_name`:
/// `YYYYMMDD` then a 3-digit count of 5-minute steps from 04:00 that day.
///
/// `NEMPriceSetter_2017103128100.csv` decodes to 2017-10-31 04:00 plus
/// 281 * 5 minutes, i.e. 2017-11-01 03:25.
pub fn parse_file_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let digits = FILE_STAMP.as_ref()?.find(file_name)?.as_str();

    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    let minute_id: i64 = digits[8..11].parse().ok()?;

    let base = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(4, 0, 0)?;
    Some(base + Duration::minutes(minute_id * 5))
}

/// Marker object key for a landing bucket.
pub fn marker_key(bucket: &str) -> String {
    format!("msck-completed-files/{bucket}-msck-completed.txt")
}

/// Where completion markers live.
///
/// `exists` returns `Ok(false)` only when the marker is definitely absent.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StorageError>;
}

#[async_trait]
impl MarkerStore for BlobStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        BlobStore::exists(self, key).await
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), StorageError> {
        BlobStore::put(self, key, body).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// First event for the bucket: repair ran. A failed marker write means
    /// the next event repairs again.
    Repaired { marker_written: bool },
    PartitionAdded(PartitionKey),
    /// The file name carries no timestamp; nothing was registered.
    Skipped { file_name: String },
}

pub struct PartitionRegistrar {
    markers: Arc<dyn MarkerStore>,
    catalog: Arc<dyn PartitionCatalog>,
}

impl PartitionRegistrar {
    /// `markers` is usually the [`BlobStore`] of the marker bucket.
    pub fn new(markers: Arc<dyn MarkerStore>, catalog: Arc<dyn PartitionCatalog>) -> Self {
        Self { markers, catalog }
    }

    pub async fn handle(&self, landed: &LandedFile) -> Result<RegistrationOutcome, RegistrarError> {
        let marker = marker_key(&landed.bucket);
        info!(bucket = %landed.bucket, key = %landed.key, "Handling landed file");

        let repaired = match self.markers.exists(&marker).await {
            Ok(found) => found,
            Err(e) => {
                error!(
                    bucket = %landed.bucket,
                    marker = %marker,
                    error = %e,
                    "Unable to repair or partition: marker check failed"
                );
                return Err(e.into());
            }
        };

        if !repaired {
            self.catalog.repair(&landed.bucket).await?;
            let body = Bytes::from(format!("MSCK completed for {}", landed.bucket));
            let marker_written = match self.markers.put(&marker, body).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(bucket = %landed.bucket, error = %e, "Unable to write marker, repair will run again");
                    false
                }
            };
            info!(bucket = %landed.bucket, marker_written, "Repair completed");
            return Ok(RegistrationOutcome::Repaired { marker_written });
        }

        let file_name = landed.file_name();
        let Some(timestamp) = parse_file_timestamp(file_name) else {
            warn!(file_name, "Unable to parse file name, not adding partition");
            return Ok(RegistrationOutcome::Skipped {
                file_name: file_name.to_string(),
            });
        };

        let key = PartitionKey::from_timestamp(timestamp);
        self.catalog.add_partition(&landed.bucket, &key).await?;
        info!(bucket = %landed.bucket, %timestamp, "Partition added");
        Ok(RegistrationOutcome::PartitionAdded(key))
    }
}
